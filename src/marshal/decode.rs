//! XML-RPC document reader.
//!
//! A small recursive-descent parser over `quick_xml` pull events. Whitespace
//! between structural elements is ignored; text inside scalar elements is
//! kept verbatim.

use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use quick_xml::{Reader, events::Event};

use super::{Fault, MarshalError, Payload};
use crate::value::Value;

pub(super) fn payload(bytes: &[u8]) -> Result<Payload, MarshalError> {
    let text = std::str::from_utf8(bytes)?;
    let mut parser = Parser::new(text);
    let payload = match parser.next_significant()? {
        Token::Start(name) if name == "methodResponse" => parser.method_response()?,
        Token::Start(name) if name == "methodCall" => parser.method_call()?,
        other => return Err(unexpected("<methodResponse> or <methodCall>", &other)),
    };
    match parser.next_significant()? {
        Token::Eof => Ok(payload),
        other => Err(unexpected("end of document", &other)),
    }
}

#[derive(Debug)]
enum Token {
    Start(String),
    End(String),
    Empty(String),
    Text(String),
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Start(name) => format!("<{name}>"),
            Self::End(name) => format!("</{name}>"),
            Self::Empty(name) => format!("<{name}/>"),
            Self::Text(text) => format!("text {text:?}"),
            Self::Eof => "end of document".to_owned(),
        }
    }
}

fn unexpected(expected: &'static str, found: &Token) -> MarshalError {
    MarshalError::Unexpected {
        expected,
        found: found.describe(),
    }
}

fn xml_error(err: impl std::fmt::Display) -> MarshalError { MarshalError::Xml(err.to_string()) }

fn element_name(raw: &[u8]) -> Result<String, MarshalError> {
    Ok(std::str::from_utf8(raw)?.to_owned())
}

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            reader: Reader::from_str(text),
        }
    }

    fn next_raw(&mut self) -> Result<Token, MarshalError> {
        loop {
            let token = match self.reader.read_event().map_err(xml_error)? {
                Event::Start(e) => Token::Start(element_name(e.name().as_ref())?),
                Event::End(e) => Token::End(element_name(e.name().as_ref())?),
                Event::Empty(e) => Token::Empty(element_name(e.name().as_ref())?),
                Event::Text(t) => Token::Text(t.unescape().map_err(xml_error)?.into_owned()),
                Event::CData(c) => Token::Text(std::str::from_utf8(&c)?.to_owned()),
                Event::Eof => Token::Eof,
                // Declarations, comments and processing instructions carry no data.
                _ => continue,
            };
            return Ok(token);
        }
    }

    fn next_significant(&mut self) -> Result<Token, MarshalError> {
        loop {
            match self.next_raw()? {
                Token::Text(text) if text.trim().is_empty() => {}
                token => return Ok(token),
            }
        }
    }

    fn expect_start(&mut self, name: &'static str) -> Result<(), MarshalError> {
        match self.next_significant()? {
            Token::Start(found) if found == name => Ok(()),
            other => Err(unexpected(name, &other)),
        }
    }

    fn expect_end(&mut self, name: &'static str) -> Result<(), MarshalError> {
        match self.next_significant()? {
            Token::End(found) if found == name => Ok(()),
            other => Err(unexpected(name, &other)),
        }
    }

    /// Collect character data up to the closing tag of `name`.
    fn text_until_end(&mut self, name: &'static str) -> Result<String, MarshalError> {
        let mut text = String::new();
        loop {
            match self.next_raw()? {
                Token::Text(chunk) => text.push_str(&chunk),
                Token::End(found) if found == name => return Ok(text),
                other => return Err(unexpected(name, &other)),
            }
        }
    }

    fn method_call(&mut self) -> Result<Payload, MarshalError> {
        self.expect_start("methodName")?;
        let method = self.text_until_end("methodName")?.trim().to_owned();
        if method.is_empty() {
            return Err(MarshalError::EmptyMethodName);
        }
        let params = match self.next_significant()? {
            Token::Start(name) if name == "params" => {
                let params = self.params()?;
                self.expect_end("methodCall")?;
                params
            }
            Token::Empty(name) if name == "params" => {
                self.expect_end("methodCall")?;
                Vec::new()
            }
            Token::End(name) if name == "methodCall" => Vec::new(),
            other => return Err(unexpected("<params>", &other)),
        };
        Ok(Payload::Notification { method, params })
    }

    fn method_response(&mut self) -> Result<Payload, MarshalError> {
        let payload = match self.next_significant()? {
            Token::Start(name) if name == "params" => {
                let value = self
                    .params()?
                    .into_iter()
                    .next()
                    .ok_or(MarshalError::EmptyResponse)?;
                Payload::Reply(value)
            }
            Token::Empty(name) if name == "params" => return Err(MarshalError::EmptyResponse),
            Token::Start(name) if name == "fault" => {
                let value = self.value_element()?;
                self.expect_end("fault")?;
                Payload::Fault(fault_from_value(value)?)
            }
            other => return Err(unexpected("<params> or <fault>", &other)),
        };
        self.expect_end("methodResponse")?;
        Ok(payload)
    }

    /// Parse `<param>` children up to and including `</params>`.
    fn params(&mut self) -> Result<Vec<Value>, MarshalError> {
        let mut params = Vec::new();
        loop {
            match self.next_significant()? {
                Token::Start(name) if name == "param" => {
                    params.push(self.value_element()?);
                    self.expect_end("param")?;
                }
                Token::End(name) if name == "params" => return Ok(params),
                other => return Err(unexpected("<param>", &other)),
            }
        }
    }

    /// Parse a complete `<value>` element.
    fn value_element(&mut self) -> Result<Value, MarshalError> {
        match self.next_significant()? {
            Token::Start(name) if name == "value" => self.value_body(),
            Token::Empty(name) if name == "value" => Ok(Value::String(String::new())),
            other => Err(unexpected("<value>", &other)),
        }
    }

    /// Parse the content of a `<value>` whose start tag was consumed.
    fn value_body(&mut self) -> Result<Value, MarshalError> {
        let mut text = String::new();
        loop {
            match self.next_raw()? {
                Token::Text(chunk) => text.push_str(&chunk),
                // An untyped value is a string.
                Token::End(name) if name == "value" => return Ok(Value::String(text)),
                Token::Start(tag) if text.trim().is_empty() => {
                    let value = self.typed(&tag)?;
                    self.expect_end("value")?;
                    return Ok(value);
                }
                Token::Empty(tag) if text.trim().is_empty() => {
                    let value = empty_typed(&tag)?;
                    self.expect_end("value")?;
                    return Ok(value);
                }
                other => return Err(unexpected("a typed value", &other)),
            }
        }
    }

    fn typed(&mut self, tag: &str) -> Result<Value, MarshalError> {
        match tag {
            "int" => parse_int("int", &self.text_until_end("int")?),
            "i4" => parse_int("i4", &self.text_until_end("i4")?),
            "i8" => parse_int("i8", &self.text_until_end("i8")?),
            "boolean" => parse_bool(&self.text_until_end("boolean")?),
            "string" => Ok(Value::String(self.text_until_end("string")?)),
            "double" => parse_double(&self.text_until_end("double")?),
            "dateTime.iso8601" => Ok(Value::DateTime(
                self.text_until_end("dateTime.iso8601")?.trim().to_owned(),
            )),
            "base64" => parse_base64(&self.text_until_end("base64")?),
            "nil" => {
                self.expect_end("nil")?;
                Ok(Value::Nil)
            }
            "array" => self.array(),
            "struct" => self.structure(),
            other => Err(MarshalError::Unexpected {
                expected: "an XML-RPC type tag",
                found: format!("<{other}>"),
            }),
        }
    }

    fn array(&mut self) -> Result<Value, MarshalError> {
        let mut items = Vec::new();
        match self.next_significant()? {
            Token::Start(name) if name == "data" => loop {
                match self.next_significant()? {
                    Token::Start(name) if name == "value" => items.push(self.value_body()?),
                    Token::Empty(name) if name == "value" => items.push(Value::String(String::new())),
                    Token::End(name) if name == "data" => break,
                    other => return Err(unexpected("<value>", &other)),
                }
            },
            Token::Empty(name) if name == "data" => {}
            other => return Err(unexpected("<data>", &other)),
        }
        self.expect_end("array")?;
        Ok(Value::Array(items))
    }

    fn structure(&mut self) -> Result<Value, MarshalError> {
        let mut members = BTreeMap::new();
        loop {
            match self.next_significant()? {
                Token::Start(name) if name == "member" => {
                    self.expect_start("name")?;
                    let key = self.text_until_end("name")?;
                    let value = self.value_element()?;
                    self.expect_end("member")?;
                    members.insert(key, value);
                }
                Token::End(name) if name == "struct" => return Ok(Value::Struct(members)),
                other => return Err(unexpected("<member>", &other)),
            }
        }
    }
}

fn empty_typed(tag: &str) -> Result<Value, MarshalError> {
    match tag {
        "string" => Ok(Value::String(String::new())),
        "nil" => Ok(Value::Nil),
        "base64" => Ok(Value::Base64(Vec::new())),
        "array" => Ok(Value::Array(Vec::new())),
        "struct" => Ok(Value::Struct(BTreeMap::new())),
        other => Err(MarshalError::Unexpected {
            expected: "a non-empty scalar",
            found: format!("<{other}/>"),
        }),
    }
}

fn parse_int(kind: &'static str, text: &str) -> Result<Value, MarshalError> {
    text.trim()
        .parse::<i64>()
        .map(Value::Int)
        .map_err(|_| MarshalError::InvalidValue {
            kind,
            text: text.to_owned(),
        })
}

fn parse_bool(text: &str) -> Result<Value, MarshalError> {
    match text.trim() {
        "1" | "true" => Ok(Value::Bool(true)),
        "0" | "false" => Ok(Value::Bool(false)),
        _ => Err(MarshalError::InvalidValue {
            kind: "boolean",
            text: text.to_owned(),
        }),
    }
}

fn parse_double(text: &str) -> Result<Value, MarshalError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())
        .map(Value::Double)
        .ok_or_else(|| MarshalError::InvalidValue {
            kind: "double",
            text: text.to_owned(),
        })
}

fn parse_base64(text: &str) -> Result<Value, MarshalError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map(Value::Base64)
        .map_err(|_| MarshalError::InvalidValue {
            kind: "base64",
            text: text.to_owned(),
        })
}

fn fault_from_value(value: Value) -> Result<Fault, MarshalError> {
    let Value::Struct(mut members) = value else {
        return Err(MarshalError::MalformedFault("a struct body"));
    };
    let code = members
        .remove("faultCode")
        .and_then(|v| v.as_i64())
        .ok_or(MarshalError::MalformedFault("faultCode"))?;
    let message = match members.remove("faultString") {
        Some(Value::String(message)) => message,
        _ => return Err(MarshalError::MalformedFault("faultString")),
    };
    Ok(Fault { code, message })
}
