//! A tiny, deterministic interpreter for the restricted language sandboxed
//! page scripts are written in. There is no host binding here: this
//! interpreter is the whole runtime, with no access to the filesystem,
//! process control, or raw sockets — only deterministic math, string/list/map
//! manipulation, time-of-day, JSON (de)serialization, and the request handle.

use std::collections::HashMap;
use std::fmt;

use rednet_types::now_ms;

use crate::request::SandboxRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Null => write!(f, "null"),
            Value::List(items) => {
                write!(f, "[{}]", items.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","))
            },
            Value::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Value {
    fn to_json(&self) -> String {
        serde_json::to_string(&self.to_serde()).unwrap_or_default()
    }

    fn to_serde(&self) -> serde_json::Value {
        match self {
            Value::Number(n) => serde_json::json!(n),
            Value::Text(s) => serde_json::json!(s),
            Value::Null => serde_json::Value::Null,
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_serde).collect()),
            Value::Map(map) => {
                serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_serde())).collect())
            },
        }
    }

    fn from_serde(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from_serde).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from_serde(v))).collect())
            },
        }
    }

    fn as_number(&self) -> Result<f64, String> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(format!("expected number, got {other}")),
        }
    }
}

struct Interpreter<'a> {
    request: &'a SandboxRequest,
    vars: HashMap<String, Value>,
    output: String,
}

/// Run `code` against `request`, returning the captured output buffer or a
/// short error string.
pub fn run(code: &str, request: &SandboxRequest) -> Result<String, String> {
    let mut interpreter = Interpreter {
        request,
        vars: HashMap::new(),
        output: String::new(),
    };
    for (line_number, line) in code.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        interpreter
            .exec_statement(line)
            .map_err(|e| format!("line {}: {e}", line_number + 1))?;
    }
    Ok(interpreter.output)
}

impl Interpreter<'_> {
    fn exec_statement(&mut self, line: &str) -> Result<(), String> {
        if let Some(rest) = line.strip_prefix("let ") {
            let (name, expr) = rest.split_once('=').ok_or("expected '=' in let statement")?;
            let value = self.eval(expr.trim())?;
            self.vars.insert(name.trim().to_string(), value);
            Ok(())
        } else if let Some(rest) = line.strip_prefix("print ") {
            let value = self.eval(rest.trim())?;
            self.output.push_str(&value.to_string());
            self.output.push('\n');
            Ok(())
        } else {
            Err(format!("unrecognized statement: '{line}'"))
        }
    }

    fn eval(&self, expr: &str) -> Result<Value, String> {
        let expr = expr.trim();
        if let Some(stripped) = expr.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            return Ok(Value::Text(stripped.to_string()));
        }
        if let Ok(n) = expr.parse::<f64>() {
            return Ok(Value::Number(n));
        }
        if let Some(path) = expr.strip_prefix("request.") {
            return Ok(self.eval_request_field(path));
        }
        if let Some(open) = expr.find('(') {
            if expr.ends_with(')') {
                let name = &expr[..open];
                let args_str = &expr[open + 1..expr.len() - 1];
                let args = split_args(args_str)
                    .into_iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                return self.call(name, args);
            }
        }
        self.vars.get(expr).cloned().ok_or_else(|| format!("unknown identifier '{expr}'"))
    }

    fn eval_request_field(&self, path: &str) -> Value {
        match path.split_once('.') {
            Some(("param", key)) => self.request.params.get(key).cloned().map(Value::Text).unwrap_or(Value::Null),
            Some(("header", key)) => self.request.headers.get(key).cloned().map(Value::Text).unwrap_or(Value::Null),
            Some(("cookie", key)) => self.request.cookies.get(key).cloned().map(Value::Text).unwrap_or(Value::Null),
            _ => match path {
                "url" => Value::Text(self.request.url.clone()),
                "method" => Value::Text(self.request.method.clone()),
                "body" => self.request.body.clone().map(Value::Text).unwrap_or(Value::Null),
                _ => Value::Null,
            },
        }
    }

    fn call(&self, name: &str, mut args: Vec<Value>) -> Result<Value, String> {
        match name {
            "add" | "sub" | "mul" | "div" => {
                if args.len() != 2 {
                    return Err(format!("{name} takes exactly 2 arguments"));
                }
                let b = args.pop().unwrap().as_number()?;
                let a = args.pop().unwrap().as_number()?;
                Ok(Value::Number(match name {
                    "add" => a + b,
                    "sub" => a - b,
                    "mul" => a * b,
                    "div" if b != 0.0 => a / b,
                    "div" => return Err("division by zero".to_string()),
                    _ => unreachable!(),
                }))
            },
            "concat" => Ok(Value::Text(args.into_iter().map(|v| v.to_string()).collect())),
            "upper" => Ok(Value::Text(single_text(args)?.to_uppercase())),
            "lower" => Ok(Value::Text(single_text(args)?.to_lowercase())),
            "len" => match args.into_iter().next() {
                Some(Value::Text(s)) => Ok(Value::Number(s.chars().count() as f64)),
                Some(Value::List(items)) => Ok(Value::Number(items.len() as f64)),
                Some(other) => Err(format!("len() not supported for {other}")),
                None => Err("len() takes one argument".to_string()),
            },
            "now" => Ok(Value::Number(now_ms() as f64)),
            "json" => Ok(Value::Text(args.into_iter().next().ok_or("json() takes one argument")?.to_json())),
            "parse_json" => {
                let text = single_text(args)?;
                let parsed: serde_json::Value =
                    serde_json::from_str(&text).map_err(|e| format!("invalid json: {e}"))?;
                Ok(Value::from_serde(parsed))
            },
            other => Err(format!("unknown function '{other}'")),
        }
    }
}

fn single_text(mut args: Vec<Value>) -> Result<String, String> {
    match args.pop() {
        Some(value) => Ok(value.to_string()),
        None => Err("expected one argument".to_string()),
    }
}

fn split_args(args: &str) -> Vec<&str> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut in_string = false;
    let mut start = 0;
    for (i, ch) in args.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth -= 1,
            ',' if depth == 0 && !in_string => {
                parts.push(args[start..i].trim());
                start = i + 1;
            },
            _ => {},
        }
    }
    parts.push(args[start..].trim());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> SandboxRequest {
        SandboxRequest {
            url: "shop.comp1.rednet/greet".to_string(),
            method: "GET".to_string(),
            params: HashMap::from([("name".to_string(), "ava".to_string())]),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
        }
    }

    #[test]
    fn prints_concatenated_greeting_from_request_param() {
        let code = r#"let name = upper(request.param.name)
print concat("hello, ", name)"#;
        let output = run(code, &req()).unwrap();
        assert_eq!(output, "hello, AVA\n");
    }

    #[test]
    fn arithmetic_is_deterministic() {
        let output = run("print add(mul(2, 3), 1)", &req()).unwrap();
        assert_eq!(output, "7\n");
    }

    #[test]
    fn unknown_identifier_is_a_normalized_error() {
        let err = run("print missing", &req()).unwrap_err();
        assert!(err.contains("unknown identifier"));
    }

    #[test]
    fn json_round_trips_through_parse_json() {
        let code = r#"let doc = parse_json("{\"a\":1}")
print json(doc)"#;
        let output = run(code, &req()).unwrap();
        assert_eq!(output.trim(), r#"{"a":1.0}"#);
    }
}
