//! Type-directed construction of call arguments from a line stream.
//!
//! Every prompt consumes exactly one line. A blank line (or the end of the
//! input) means "absent": it omits a top-level argument, and inside a
//! collection it ends the collection. Interactive input and a piped script
//! follow the same line contract.

use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use crate::codec;
use crate::error::{Error, Result};
use crate::schema::{EnumSchema, ParameterSpec, RecordSchema, Registry, TypeDescriptor, TypeRef};
use crate::value::{EnumValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionKind {
    List,
    Set,
}

impl CollectionKind {
    fn label(self) -> &'static str {
        match self {
            CollectionKind::List => "List",
            CollectionKind::Set => "Set",
        }
    }
}

/// Builds argument values by prompting on `output` and reading `input`.
pub struct ParamBuilder<'a, R, W> {
    registry: &'a Registry,
    input: R,
    output: W,
}

impl<'a, R, W> ParamBuilder<'a, R, W>
where
    R: BufRead,
    W: Write,
{
    pub fn new(registry: &'a Registry, input: R, output: W) -> Self {
        Self {
            registry,
            input,
            output,
        }
    }

    /// Build one value for `spec`. `None` means the user left it blank.
    pub fn build(&mut self, spec: &ParameterSpec) -> Result<Option<Value>> {
        self.build_value(&spec.name, &spec.ty)
    }

    /// Where prompts go, for callers reporting progress between builds.
    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    fn build_value(&mut self, name: &str, ty: &TypeRef) -> Result<Option<Value>> {
        let registry = self.registry;
        match registry.classify(name, ty)? {
            TypeDescriptor::Record(schema) => self.build_record(name, schema),
            TypeDescriptor::List(elem) => self.build_collection(name, elem, CollectionKind::List),
            TypeDescriptor::Set(elem) => self.build_collection(name, elem, CollectionKind::Set),
            TypeDescriptor::Enum(schema) => self.build_enum(name, schema),
        }
    }

    fn build_record(&mut self, name: &str, schema: &RecordSchema) -> Result<Option<Value>> {
        self.prompt(&format!(
            "Enter JSON value for {name}({}), (Enter blank to not enter): ",
            schema.name
        ))?;
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };
        let record = codec::decode(self.registry, &schema.name, &line)?;
        log::debug!("Decoded {record} for {name}");
        Ok(Some(Value::Record(record)))
    }

    fn build_collection(
        &mut self,
        name: &str,
        declared: &TypeRef,
        kind: CollectionKind,
    ) -> Result<Option<Value>> {
        self.prompt(&format!(
            "Enter true type for {name} (Enter blank for empty collection): "
        ))?;
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };
        let true_type = TypeRef::parse(&line)
            .map_err(|reason| Error::decode(&declared.to_string(), &line, reason))?;
        if !declared.accepts(&true_type) {
            return Err(Error::decode(
                &declared.to_string(),
                &line,
                format!("true type `{true_type}` does not match declared element type `{declared}`"),
            ));
        }

        writeln!(self.output, "Selecting {true_type} for true type for {name}")?;
        self.prompt(&format!(
            "Begin to enter {name} ({} of {true_type}): ",
            kind.label()
        ))?;

        let mut items = Vec::new();
        while let Some(item) = self.build_value(name, &true_type)? {
            items.push(item);
        }

        let value = match kind {
            CollectionKind::List => Value::List(items),
            CollectionKind::Set => Value::Set(items.into_iter().collect::<BTreeSet<_>>()),
        };
        let size = match &value {
            Value::List(items) => items.len(),
            Value::Set(items) => items.len(),
            _ => 0,
        };
        writeln!(
            self.output,
            "Completed a {} of {true_type} of size {size}",
            kind.label()
        )?;
        Ok(Some(value))
    }

    fn build_enum(&mut self, name: &str, schema: &EnumSchema) -> Result<Option<Value>> {
        self.prompt(&format!(
            "Enter enum value for {name}({}), (Enter blank to stop): ",
            schema.name
        ))?;
        let Some(symbol) = self.next_line()? else {
            return Ok(None);
        };
        let value = schema
            .value_of(&symbol)
            .ok_or_else(|| Error::UnknownSymbol {
                enum_name: schema.name.clone(),
                text: symbol.clone(),
            })?;
        Ok(Some(Value::Enum(EnumValue {
            enum_name: schema.name.clone(),
            symbol,
            value,
        })))
    }

    fn prompt(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes())?;
        self.output.flush()?;
        Ok(())
    }

    /// Next line with surrounding whitespace removed; `None` when it is
    /// blank or the input is exhausted.
    fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            log::debug!("Input exhausted, treating as blank");
            writeln!(self.output)?;
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::value::Record;

    const DOC: &str = r#"{
        "records": [
            { "name": "Int32Record", "fields": [{ "id": 1, "name": "value", "type": "i32" }] }
        ],
        "enums": [{ "name": "Count", "symbols": [{ "name": "ZERO" }, { "name": "ONE" }] }]
    }"#;

    fn registry() -> Registry {
        Registry::from_json(DOC).unwrap()
    }

    fn spec(name: &str, ty: &str) -> ParameterSpec {
        ParameterSpec {
            name: name.into(),
            ty: TypeRef::parse(ty).unwrap(),
            required: false,
        }
    }

    fn int_record(v: i32) -> Value {
        Value::Record(Record::new("Int32Record").with(1, "value", Value::I32(v)))
    }

    /// Build `spec` from `script`; also returns the unread rest of the script.
    fn build(registry: &Registry, spec: &ParameterSpec, script: &str) -> (Result<Option<Value>>, String) {
        let mut builder = ParamBuilder::new(registry, Cursor::new(script.as_bytes()), Vec::new());
        let result = builder.build(spec);
        let (mut input, _) = builder.into_inner();
        let mut rest = String::new();
        std::io::Read::read_to_string(&mut input, &mut rest).unwrap();
        (result, rest)
    }

    #[test]
    fn list_keeps_entry_order() {
        let registry = registry();
        let script = "Int32Record\n{\"value\": 3}\n{\"value\": 1}\n{\"value\": 3}\n\nleftover\n";
        let (result, rest) = build(&registry, &spec("values", "list<Int32Record>"), script);

        assert_eq!(
            result.unwrap(),
            Some(Value::List(vec![int_record(3), int_record(1), int_record(3)]))
        );
        assert_eq!(rest, "leftover\n");
    }

    #[test]
    fn set_collapses_duplicate_entries() {
        let registry = registry();
        let script = "Count\nONE\nZERO\nONE\nONE\n\n";
        let (result, _) = build(&registry, &spec("counts", "set<Count>"), script);

        match result.unwrap() {
            Some(Value::Set(items)) => {
                let symbols: Vec<&str> = items
                    .iter()
                    .filter_map(|v| v.as_enum().map(|e| e.symbol.as_str()))
                    .collect();
                assert_eq!(symbols, vec!["ZERO", "ONE"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blank_true_type_omits_the_collection() {
        let registry = registry();
        let (result, rest) = build(&registry, &spec("values", "list<Int32Record>"), "\nnext\n");
        assert_eq!(result.unwrap(), None);
        assert_eq!(rest, "next\n");
    }

    #[test]
    fn blank_record_line_is_absent_without_decoding() {
        let registry = registry();
        let (result, rest) = build(&registry, &spec("r", "Int32Record"), "   \nnot json\n");
        assert_eq!(result.unwrap(), None);
        assert_eq!(rest, "not json\n");
    }

    #[test]
    fn nested_collections_each_take_a_true_type() {
        let registry = registry();
        let script = concat!(
            "list<Int32Record>\n", // outer true type
            "Int32Record\n",       // first inner list
            "{\"value\": 1}\n",
            "\n",
            "Int32Record\n", // second inner list
            "\n",
            "\n", // end of outer list
        );
        let (result, rest) = build(&registry, &spec("grid", "list<any>"), script);

        assert_eq!(
            result.unwrap(),
            Some(Value::List(vec![
                Value::List(vec![int_record(1)]),
                Value::List(vec![]),
            ]))
        );
        assert_eq!(rest, "");
    }

    #[test]
    fn end_of_input_closes_every_open_frame() {
        let registry = registry();
        let script = "list<Int32Record>\nInt32Record\n{\"value\": 5}";
        let (result, _) = build(&registry, &spec("grid", "list<any>"), script);
        assert_eq!(
            result.unwrap(),
            Some(Value::List(vec![Value::List(vec![int_record(5)])]))
        );
    }

    #[test]
    fn unknown_enum_symbol_fails() {
        let registry = registry();
        let (result, _) = build(&registry, &spec("count", "Count"), "one\n");
        match result {
            Err(Error::UnknownSymbol { enum_name, text }) => {
                assert_eq!(enum_name, "Count");
                assert_eq!(text, "one");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mismatched_true_type_is_a_decode_error() {
        let registry = registry();
        let (result, _) = build(&registry, &spec("values", "list<Int32Record>"), "Count\n");
        assert!(matches!(result, Err(Error::Decode { .. })));

        let (result, _) = build(&registry, &spec("values", "list<any>"), "list<\n");
        assert!(matches!(result, Err(Error::Decode { .. })));

        let (result, _) = build(&registry, &spec("values", "list<any>"), "Int32 Record\n");
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn malformed_record_text_aborts() {
        let registry = registry();
        let script = "Int32Record\n{\"value\": 1}\n{\"value\": true}\n\n";
        let (result, _) = build(&registry, &spec("values", "list<Int32Record>"), script);
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn unsupported_type_consumes_no_input() {
        let registry = registry();
        let (result, rest) = build(&registry, &spec("n", "i32"), "5\n");
        assert!(matches!(result, Err(Error::UnsupportedType { .. })));
        assert_eq!(rest, "5\n");
    }

    #[test]
    fn prompts_describe_each_step() {
        let registry = registry();
        let mut out = Vec::new();
        let script = "Int32Record\n{\"value\": 2}\n\n";
        let mut builder = ParamBuilder::new(&registry, Cursor::new(script), &mut out);
        builder.build(&spec("values", "list<Int32Record>")).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Enter true type for values (Enter blank for empty collection): "));
        assert!(text.contains("Selecting Int32Record for true type for values"));
        assert!(text.contains("Enter JSON value for values(Int32Record)"));
        assert!(text.ends_with("Completed a List of Int32Record of size 1\n"));
    }
}
