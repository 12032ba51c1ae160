//! Resolve a method, build its arguments, call it, report the result.

use std::io::{BufRead, Write};

use crate::builder::ParamBuilder;
use crate::client::RemoteService;
use crate::error::{Error, Result};
use crate::schema::{MethodSignature, Registry};
use crate::value::{DisplayArgs, Value};

/// Run one invocation of `method_name` on `stub`, reading argument values
/// from `input` and writing prompts, progress and the result to `output`.
pub async fn invoke<S, R, W>(
    stub: &mut S,
    registry: &Registry,
    method_name: &str,
    input: R,
    output: &mut W,
) -> Result<Option<Value>>
where
    S: RemoteService + ?Sized,
    R: BufRead,
    W: Write,
{
    let method = stub.descriptor().resolve(method_name)?.clone();
    let service = stub.descriptor().name.clone();

    let args = collect_arguments(registry, &method, input, &mut *output)?;
    writeln!(
        output,
        "Querying {service}.{}({})",
        method.name,
        DisplayArgs(&args)
    )?;

    let result = stub.call(&method, args).await?;
    writeln!(output, "\nResult:")?;
    write_value(output, result.as_ref(), 0, None)?;
    Ok(result)
}

/// Build every parameter of `method` in declaration order.
pub fn collect_arguments<R, W>(
    registry: &Registry,
    method: &MethodSignature,
    input: R,
    mut output: W,
) -> Result<Vec<Option<Value>>>
where
    R: BufRead,
    W: Write,
{
    let mut builder = ParamBuilder::new(registry, input, &mut output);
    let mut args = Vec::with_capacity(method.parameters.len());

    for param in &method.parameters {
        let value = builder.build(param)?;
        if value.is_none() && param.required {
            return Err(Error::MissingArgument(param.name.clone()));
        }
        let shown = value.as_ref().map_or_else(|| "null".to_string(), Value::to_string);
        writeln!(builder.output(), "Adding {shown} to params for {}", param.name)?;
        args.push(value);
    }
    Ok(args)
}

/// Print `value` as an indented tree, one scalar per line.
pub fn write_value<W: Write>(
    out: &mut W,
    value: Option<&Value>,
    indent: usize,
    key: Option<&str>,
) -> std::io::Result<()> {
    let padding = " ".repeat(indent);
    let label = match key {
        Some(key) => format!("{padding}{key} : "),
        None => padding,
    };

    match value {
        None => writeln!(out, "{label}Null"),
        Some(Value::Record(record)) => {
            writeln!(out, "{label}{}:", record.schema)?;
            for field in &record.fields {
                write_value(out, Some(&field.value), indent + 3, Some(field.name.as_str()))?;
            }
            Ok(())
        }
        Some(Value::List(items)) => {
            writeln!(out, "{label}List:")?;
            for (i, item) in items.iter().enumerate() {
                write_value(out, Some(item), indent + 3, Some(i.to_string().as_str()))?;
            }
            Ok(())
        }
        Some(Value::Set(items)) => {
            writeln!(out, "{label}Set:")?;
            for item in items {
                write_value(out, Some(item), indent + 3, None)?;
            }
            Ok(())
        }
        Some(Value::Map(entries)) => {
            writeln!(out, "{label}Map:")?;
            for (k, v) in entries {
                write_value(out, Some(v), indent + 3, Some(k.to_string().as_str()))?;
            }
            Ok(())
        }
        Some(scalar) => writeln!(out, "{label}{scalar}"),
    }
}
