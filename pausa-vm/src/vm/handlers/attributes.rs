// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Attribute opcode handlers: GetAttr, SetAttr.
//!
//! Struct fields are stored on the struct. Every other attribute resolves to
//! a method: a native registered as `type.name`, bound to its receiver.

use std::rc::Rc;

use crate::callable::BoundMethod;
use crate::opcode::OpCode;
use crate::value::Value;
use crate::vm::{Result, RuntimeError, Vm};

impl Vm {
    pub(crate) fn execute_attributes(&mut self, op: OpCode, idx: usize) -> Result<()> {
        let name = self.constant_str(idx)?;
        match op {
            OpCode::GetAttr => {
                let obj = self.stack.pop()?;
                let value = self.get_attr(&obj, &name)?;
                self.stack.push(value);
            }
            OpCode::SetAttr => {
                let obj = self.stack.pop()?;
                let value = self.stack.pop()?;
                match obj {
                    Value::Struct(s) => s.set(name, value),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "cannot set attribute '{}' on '{}' object",
                            name,
                            other.type_name()
                        )))
                    }
                }
            }
            _ => return Err(RuntimeError::BadOperand("execute_attributes")),
        }
        Ok(())
    }

    /// `obj.name`.
    pub fn get_attr(&self, obj: &Value, name: &str) -> Result<Value> {
        if let Value::Struct(s) = obj {
            if let Some(v) = s.get(name) {
                return Ok(v);
            }
        }
        match self.method(obj, name) {
            Some(method) => Ok(Value::BoundMethod(Rc::new(BoundMethod {
                receiver: obj.clone(),
                method,
            }))),
            None => Err(RuntimeError::NoAttribute {
                type_name: obj.type_name(),
                name: name.to_string(),
            }),
        }
    }

    /// True if `obj.name` would succeed.
    pub fn has_attr(&self, obj: &Value, name: &str) -> bool {
        match obj {
            Value::Struct(s) if s.has(name) => true,
            _ => self.method(obj, name).is_some(),
        }
    }

    fn method(&self, obj: &Value, name: &str) -> Option<Value> {
        let qualified = format!("{}.{}", obj.type_name(), name);
        self.natives.get(qualified.as_str()).cloned().map(Value::Native)
    }
}
