// pausa-vm - Function call and language feature tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

mod common;

use common::{run, vm_for, finish};

#[test]
fn test_literals() {
    assert_eq!(run("42"), "42");
    assert_eq!(run("2.5"), "2.5");
    assert_eq!(run("True"), "True");
    assert_eq!(run("None"), "None");
    assert_eq!(run("'hi'"), "\"hi\"");
    assert_eq!(run("(1,)"), "(1,)");
    assert_eq!(run("[1, 'a', None]"), "[1, \"a\", None]");
}

#[test]
fn test_module_without_trailing_expression() {
    assert_eq!(run("x = 1\n"), "None");
}

#[test]
fn test_arithmetic_promotion() {
    assert_eq!(run("1 + 2"), "3");
    assert_eq!(run("1 + 2.0"), "3.0");
    assert_eq!(run("7 / 2"), "3.5");
    assert_eq!(run("7 // 2"), "3");
    assert_eq!(run("-7 // 2"), "-4");
    assert_eq!(run("-7 % 3"), "2");
    assert_eq!(run("2 ** 10"), "1024");
    assert_eq!(run("'ab' * 3"), "\"ababab\"");
    assert_eq!(run("[1] + [2]"), "[1, 2]");
}

#[test]
fn test_if_and_while() {
    let src = "x = 0\nn = 0\nwhile n < 5:\n    n += 1\n    if n == 3:\n        continue\n    x += n\nx\n";
    assert_eq!(run(src), "12");
    let src = "i = 0\nwhile True:\n    i += 1\n    if i > 3:\n        break\ni\n";
    assert_eq!(run(src), "4");
}

#[test]
fn test_for_break_inside_nested_loop() {
    let src = "out = []\nfor i in range(3):\n    for j in range(3):\n        if j == 1:\n            break\n        out.append((i, j))\nout\n";
    assert_eq!(run(src), "[(0, 0), (1, 0), (2, 0)]");
}

#[test]
fn test_defaults_and_keywords() {
    let src = "def f(a, b=2, c=3):\n    return [a, b, c]\n[f(1), f(1, c=9), f(c=0, a=5)]\n";
    assert_eq!(run(src), "[[1, 2, 3], [1, 2, 9], [5, 2, 0]]");
}

#[test]
fn test_defaults_evaluated_once() {
    let src = "n = 1\ndef f(x=n):\n    return x\nn = 2\nf()\n";
    assert_eq!(run(src), "1");
}

#[test]
fn test_variadic() {
    let src = "def f(a, *rest):\n    return [a, rest]\nf(1, 2, 3)\n";
    assert_eq!(run(src), "[1, [2, 3]]");
    let src = "def f(*rest):\n    rest.append(1)\nf()\n";
    assert!(run(src).starts_with("Error: cannot modify immutable"));
}

#[test]
fn test_star_arguments() {
    let src = "def f(a, b, c):\n    return a * 100 + b * 10 + c\nargs = [2, 3]\nkw = {'c': 4}\n[f(1, *args), f(*[1, 2], **kw)]\n";
    assert_eq!(run(src), "[123, 124]");
}

#[test]
fn test_closures_capture_environment() {
    let src = "def counter():\n    n = 0\n    def inc():\n        nonlocal n\n        n += 1\n        return n\n    return inc\nc = counter()\nc()\nc()\nc()\n";
    assert_eq!(run(src), "3");
}

#[test]
fn test_global_declaration() {
    let src = "total = 0\ndef add(x):\n    global total\n    total += x\nadd(2)\nadd(5)\ntotal\n";
    assert_eq!(run(src), "7");
}

#[test]
fn test_recursion() {
    let src = "def fib(n):\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\nfib(15)\n";
    assert_eq!(run(src), "610");
}

#[test]
fn test_deep_tail_recursion() {
    let src = "def loop(n, acc):\n    if n == 0:\n        return acc\n    return loop(n - 1, acc + 1)\nloop(100000, 0)\n";
    assert_eq!(run(src), "100000");
}

#[test]
fn test_lambda() {
    assert_eq!(run("f = lambda x, y=1: x + y\nf(2)\n"), "3");
    assert_eq!(run("sorted([3, 1, 2], reverse=True)"), "[3, 2, 1]");
}

#[test]
fn test_comprehensions() {
    assert_eq!(run("[x * x for x in range(5) if x % 2 == 0]"), "[0, 4, 16]");
    assert_eq!(run("[(x, y) for x in range(2) for y in 'ab']"), "[(0, \"a\"), (0, \"b\"), (1, \"a\"), (1, \"b\")]");
    assert_eq!(run("{k: v * 2 for k, v in {'a': 1, 'b': 2}.items()}"), "{\"a\": 2, \"b\": 4}");
}

#[test]
fn test_destructuring() {
    assert_eq!(run("a, (b, c) = 1, (2, 3)\n[a, b, c]\n"), "[1, 2, 3]");
    assert_eq!(run("a = b = [1]\na.append(2)\nb\n"), "[1, 2]");
    assert!(run("a, b = [1, 2, 3]\n").starts_with("Error:"));
}

#[test]
fn test_augmented_assignment_targets() {
    assert_eq!(run("d = {'k': 1}\nd['k'] += 5\nd\n"), "{\"k\": 6}");
    assert_eq!(run("s = struct(n=1)\ns.n *= 10\ns.n\n"), "10");
    assert_eq!(run("xs = [1, 2]\nxs += [3]\nxs\n"), "[1, 2, 3]");
}

#[test]
fn test_boolean_operators_short_circuit() {
    assert_eq!(run("0 or 'x'"), "\"x\"");
    assert_eq!(run("1 and 0"), "0");
    assert_eq!(run("None and undefined_name"), "None");
    assert_eq!(run("not ''"), "True");
    assert_eq!(run("'y' if 0 else 'n'"), "\"n\"");
}

#[test]
fn test_membership_and_comparison() {
    assert_eq!(run("2 in [1, 2]"), "True");
    assert_eq!(run("'k' not in {'k': 1}"), "False");
    assert_eq!(run("'ell' in 'hello'"), "True");
    assert_eq!(run("5 in range(0, 10, 5)"), "True");
    assert_eq!(run("1 == 1.0"), "True");
    assert_eq!(run("[1, 2] < [1, 3]"), "True");
}

#[test]
fn test_methods() {
    assert_eq!(run("xs = [3]\nxs.extend([1, 2])\nxs.insert(0, 9)\nxs"), "[9, 3, 1, 2]");
    assert_eq!(run("d = {}\nd.setdefault('a', []).append(1)\nd"), "{\"a\": [1]}");
    assert_eq!(run("','.join(['a', 'b'])"), "\"a,b\"");
    assert_eq!(run("'a b  c'.split()"), "[\"a\", \"b\", \"c\"]");
    assert_eq!(run("'  x '.strip().upper()"), "\"X\"");
    assert_eq!(run("d = {'a': 1}\nd.get('b', 0)"), "0");
}

#[test]
fn test_string_formatting() {
    assert_eq!(run("'%s has %d' % ('x', 3)"), "\"x has 3\"");
    assert_eq!(run("'{} and {}'.format(1, 'b')"), "\"1 and b\"");
}

#[test]
fn test_builtins() {
    assert_eq!(run("len('abc') + len([1]) + len({})"), "4");
    assert_eq!(run("list(range(3))"), "[0, 1, 2]");
    assert_eq!(run("min(3, 1, 2)"), "1");
    assert_eq!(run("max([1, 5, 2])"), "5");
    assert_eq!(run("int('ff', 16)"), "255");
    assert_eq!(run("type(1.0)"), "\"float\"");
    assert_eq!(run("dict(a=1)"), "{\"a\": 1}");
    assert_eq!(run("enumerate(['x'])"), "[(0, \"x\")]");
    assert_eq!(run("hasattr(struct(a=1), 'a')"), "True");
}

#[test]
fn test_print_output() {
    let mut vm = vm_for("print('a', 1)\nprint('b', 'c', sep='-')\n");
    let (_, errors) = finish(&mut vm);
    assert!(errors.is_empty());
    assert_eq!(vm.take_output(), vec!["a 1".to_string(), "b-c".to_string()]);
}

#[test]
fn test_host_natives() {
    let mut vm = vm_for("double(21) + scale(2, by=5)\n");
    vm.define_native("double", |_, args| match args.first() {
        Some(pausa_vm::Value::Int(n)) => Ok(pausa_vm::Value::Int(n * 2)),
        _ => Ok(pausa_vm::Value::Nil),
    });
    vm.define_native_kw("scale", |_, args| {
        let by = match args.last() {
            Some(pausa_vm::Value::Map(m)) => m
                .get(&pausa_vm::Key::Str("by".into()))
                .and_then(|v| v.as_int())
                .unwrap_or(1),
            _ => 1,
        };
        Ok(pausa_vm::Value::Int(args[0].as_int().unwrap_or(0) * by))
    });
    let (value, errors) = finish(&mut vm);
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(value, pausa_vm::Value::Int(52));
}

#[test]
fn test_reference_scenarios() {
    let mut vm = vm_for("a=1+2; b=a*3\n");
    finish(&mut vm);
    assert_eq!(vm.get_global("a"), Some(pausa_vm::Value::Int(3)));
    assert_eq!(vm.get_global("b"), Some(pausa_vm::Value::Int(9)));

    let fib = "def fib(n):\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\nfib(10)\n";
    assert_eq!(run(fib), "55");
    assert_eq!(run("l=[1,2,3]; l[2]=5; r=l[2]\nr\n"), "5");
    assert_eq!(run("def f(x, y):\n    return x * y\nf(**{\"x\": 3, \"y\": 4})\n"), "12");
}

#[test]
fn test_keyword_call_forms_agree() {
    let def = "def f(a, b=2):\n    return a * 10 + b\n";
    for call in ["f(10)", "f(a=10, b=2)", "f(10, b=2)"] {
        assert_eq!(run(&format!("{}{}\n", def, call)), "102");
    }
}
