//! XML-RPC document writer.

use std::fmt::Write as _;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use quick_xml::escape::escape;

use super::{Fault, MarshalError};
use crate::value::Value;

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

pub(super) fn call(method: &str, params: &[Value]) -> Result<Vec<u8>, MarshalError> {
    if method.is_empty() {
        return Err(MarshalError::EmptyMethodName);
    }
    let mut out = String::with_capacity(128);
    out.push_str(XML_DECL);
    out.push_str("<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param)?;
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    Ok(out.into_bytes())
}

pub(super) fn response(value: &Value) -> Result<Vec<u8>, MarshalError> {
    let mut out = String::with_capacity(128);
    out.push_str(XML_DECL);
    out.push_str("<methodResponse><params><param>");
    write_value(&mut out, value)?;
    out.push_str("</param></params></methodResponse>");
    Ok(out.into_bytes())
}

pub(super) fn fault(fault: &Fault) -> Vec<u8> {
    let mut out = String::with_capacity(256);
    out.push_str(XML_DECL);
    out.push_str("<methodResponse><fault><value><struct>");
    let _ = write!(
        out,
        "<member><name>faultCode</name><value><int>{}</int></value></member>",
        fault.code
    );
    out.push_str("<member><name>faultString</name><value><string>");
    out.push_str(&escape(fault.message.as_str()));
    out.push_str("</string></value></member></struct></value></fault></methodResponse>");
    out.into_bytes()
}

fn write_value(out: &mut String, value: &Value) -> Result<(), MarshalError> {
    out.push_str("<value>");
    match value {
        Value::Int(i) => {
            // Servers built around 32-bit integers only understand `<i8>`
            // for values that do not fit.
            let tag = if i32::try_from(*i).is_ok() { "int" } else { "i8" };
            let _ = write!(out, "<{tag}>{i}</{tag}>");
        }
        Value::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Double(d) => {
            if !d.is_finite() {
                return Err(MarshalError::NonFiniteDouble(*d));
            }
            let _ = write!(out, "<double>{d:?}</double>");
        }
        Value::DateTime(s) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item)?;
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, member)?;
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
    Ok(())
}
