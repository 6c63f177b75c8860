//! JSON implementation of the archive contract, backed by `serde_json::Value`

use serde_json::{Map, Number, Value};

use crate::archive::{ArchiveReader, ArchiveWriter, FromArchive, ToArchive};
use crate::error::Result;

/// Where a value in the writer stack gets attached when it is popped
enum Slot {
    Root,
    Member(String),
    Element,
}

struct Frame {
    value: Value,
    slot: Slot,
    is_set: bool,
}

impl Frame {
    fn new(slot: Slot) -> Self {
        Self {
            value: Value::Null,
            slot,
            is_set: false,
        }
    }
}

/// Archive writer that builds a JSON value tree
pub struct JsonArchiveWriter {
    stack: Vec<Frame>,
}

impl JsonArchiveWriter {
    /// Create a writer positioned on an empty root
    pub fn new() -> Self {
        Self {
            stack: vec![Frame::new(Slot::Root)],
        }
    }

    /// Close any open members and return the root value
    pub fn into_value(mut self) -> Value {
        while self.stack.len() > 1 {
            self.pop();
        }

        self.stack.pop().map(|frame| frame.value).unwrap_or(Value::Null)
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn set(&mut self, value: Value) {
        let top = self.top();
        debug_assert!(!top.is_set, "archive value set twice");
        top.value = value;
        top.is_set = true;
    }
}

impl Default for JsonArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter for JsonArchiveWriter {
    fn null(&mut self) {
        self.set(Value::Null);
    }

    fn boolean(&mut self, value: bool) {
        self.set(Value::Bool(value));
    }

    fn int(&mut self, value: i64) {
        self.set(Value::Number(value.into()));
    }

    fn uint(&mut self, value: u64) {
        self.set(Value::Number(value.into()));
    }

    fn float(&mut self, value: f64) {
        // NaN and infinities have no JSON representation
        let value = Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null);
        self.set(value);
    }

    fn string(&mut self, value: &str) {
        self.set(Value::String(value.to_owned()));
    }

    fn typed_array_f32(&mut self, values: &[f32]) {
        let array = values
            .iter()
            .map(|v| Number::from_f64(f64::from(*v)).map(Value::Number).unwrap_or(Value::Null))
            .collect();
        self.set(Value::Array(array));
    }

    fn as_array(&mut self) {
        let top = self.top();
        if !top.value.is_array() {
            debug_assert!(!top.is_set, "archive value set twice");
            top.value = Value::Array(Vec::new());
            top.is_set = true;
        }
    }

    fn as_object(&mut self) {
        let top = self.top();
        if !top.value.is_object() {
            debug_assert!(!top.is_set, "archive value set twice");
            top.value = Value::Object(Map::new());
            top.is_set = true;
        }
    }

    fn push_array_element(&mut self) {
        self.as_array();
        self.stack.push(Frame::new(Slot::Element));
    }

    fn push_object_member(&mut self, name: &str) {
        self.as_object();
        self.stack.push(Frame::new(Slot::Member(name.to_owned())));
    }

    fn pop(&mut self) {
        if self.stack.len() <= 1 {
            debug_assert!(false, "pop called on the archive root");
            return;
        }

        let Some(frame) = self.stack.pop() else {
            return;
        };

        match (frame.slot, &mut self.top().value) {
            (Slot::Member(name), Value::Object(members)) => {
                members.insert(name, frame.value);
            }
            (Slot::Element, Value::Array(elements)) => {
                elements.push(frame.value);
            }
            _ => debug_assert!(false, "archive frame does not match its parent"),
        }
    }
}

/// Archive reader over a borrowed JSON value tree
pub struct JsonArchiveReader<'a> {
    stack: Vec<&'a Value>,
}

impl<'a> JsonArchiveReader<'a> {
    /// Create a reader positioned on `root`
    pub fn new(root: &'a Value) -> Self {
        Self { stack: vec![root] }
    }

    fn current(&self) -> &'a Value {
        self.stack[self.stack.len() - 1]
    }
}

impl ArchiveReader for JsonArchiveReader<'_> {
    fn is_null(&self) -> bool {
        self.current().is_null()
    }

    fn boolean(&self) -> Option<bool> {
        self.current().as_bool()
    }

    fn int(&self) -> Option<i64> {
        self.current().as_i64()
    }

    fn uint(&self) -> Option<u64> {
        self.current().as_u64()
    }

    fn float(&self) -> Option<f64> {
        self.current().as_f64()
    }

    fn string(&self) -> Option<String> {
        self.current().as_str().map(str::to_owned)
    }

    fn is_array(&self) -> bool {
        self.current().is_array()
    }

    fn array_size(&self) -> Option<usize> {
        self.current().as_array().map(Vec::len)
    }

    fn is_object(&self) -> bool {
        self.current().is_object()
    }

    fn object_size(&self) -> Option<usize> {
        self.current().as_object().map(Map::len)
    }

    fn enumerate_array_elements(&mut self, f: &mut dyn FnMut(usize, &mut dyn ArchiveReader)) {
        let Value::Array(elements) = self.current() else {
            return;
        };

        for (index, element) in elements.iter().enumerate() {
            self.stack.push(element);
            f(index, self);
            self.stack.pop();
        }
    }

    fn enumerate_object_members(&mut self, f: &mut dyn FnMut(&str, &mut dyn ArchiveReader)) {
        let Value::Object(members) = self.current() else {
            return;
        };

        for (name, member) in members {
            self.stack.push(member);
            f(name, self);
            self.stack.pop();
        }
    }

    fn pull_array_element(&mut self, index: usize) -> bool {
        match self.current().get(index) {
            Some(element) => {
                self.stack.push(element);
                true
            }
            None => false,
        }
    }

    fn pull_object_member(&mut self, name: &str) -> bool {
        match self.current().get(name) {
            Some(member) => {
                self.stack.push(member);
                true
            }
            None => false,
        }
    }

    fn pop(&mut self) {
        if self.stack.len() <= 1 {
            debug_assert!(false, "pop called on the archive root");
            return;
        }

        self.stack.pop();
    }
}

/// Serialize `value` into a JSON value tree
pub fn to_json_value<T: ToArchive + ?Sized>(value: &T) -> Value {
    let mut writer = JsonArchiveWriter::new();
    value.to_archive(&mut writer);
    writer.into_value()
}

/// Serialize `value` into pretty-printed JSON text
pub fn to_json_string<T: ToArchive + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_json_value(value))?)
}

/// Deserialize JSON text into `value`
pub fn from_json_str<T: FromArchive + ?Sized>(text: &str, value: &mut T) -> Result<()> {
    let root: Value = serde_json::from_str(text)?;
    let mut reader = JsonArchiveReader::new(&root);
    value.from_archive(&mut reader);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_writer_builds_nested_objects() {
        let mut writer = JsonArchiveWriter::new();
        {
            let w: &mut dyn ArchiveWriter = &mut writer;
            w.object_member("name", "root");
            w.object_member("count", &3u32);
            w.push_object_member("position");
            w.typed_array_f32(&[1.0, 2.0, 3.0]);
            w.pop();
            w.object_member("steps", &vec![vec!["a".to_owned()], vec![]]);
        }

        assert_eq!(
            writer.into_value(),
            json!({
                "name": "root",
                "count": 3,
                "position": [1.0, 2.0, 3.0],
                "steps": [["a"], []],
            })
        );
    }

    #[test]
    fn test_into_value_closes_open_members() {
        let mut writer = JsonArchiveWriter::new();
        writer.push_object_member("outer");
        writer.push_object_member("inner");
        writer.boolean(true);

        assert_eq!(writer.into_value(), json!({ "outer": { "inner": true } }));
    }

    #[test]
    fn test_reader_pull_and_enumerate() {
        let root = json!({ "a": [10, 20, 30], "b": { "x": 1.5, "y": "text" } });
        let mut reader = JsonArchiveReader::new(&root);

        assert!(reader.is_object());
        assert_eq!(reader.object_size(), Some(2));
        assert!(!reader.pull_object_member("missing"));

        assert!(reader.pull_object_member("a"));
        let mut seen = Vec::new();
        reader.enumerate_array_elements(&mut |i, element| {
            seen.push((i, element.uint().unwrap_or(0)));
        });
        assert_eq!(seen, vec![(0, 10), (1, 20), (2, 30)]);
        assert!(reader.pull_array_element(2));
        assert_eq!(reader.int(), Some(30));
        reader.pop();
        reader.pop();

        let mut names = Vec::new();
        assert!(reader.pull_object_member("b"));
        reader.enumerate_object_members(&mut |name, member| {
            names.push((name.to_owned(), member.float().is_some()));
        });
        assert_eq!(names, vec![("x".to_owned(), true), ("y".to_owned(), false)]);
    }

    #[test]
    fn test_missing_members_leave_values_untouched() {
        let root = json!({ "count": "not a number" });
        let mut reader = JsonArchiveReader::new(&root);
        let reader: &mut dyn ArchiveReader = &mut reader;

        let mut count = 7u32;
        let mut name = String::from("default");
        assert!(reader.read_object_member("count", &mut count));
        assert!(!reader.read_object_member("name", &mut name));

        assert_eq!(count, 7);
        assert_eq!(name, "default");
    }

    #[test]
    fn test_vec_and_option_text_round_trip() {
        let values: Vec<Option<i32>> = vec![Some(-4), None, Some(12)];
        let text = to_json_string(&values).unwrap();

        let mut read: Vec<Option<i32>> = Vec::new();
        from_json_str(&text, &mut read).unwrap();
        assert_eq!(read, values);
    }

    #[test]
    fn test_from_json_str_rejects_bad_text() {
        let mut value = 0u32;
        assert!(from_json_str("{ not json", &mut value).is_err());
    }
}
