//! Archive contract for scene and pipeline serialization
//!
//! Readers and writers are cursors over a tree of values (null, booleans,
//! numbers, strings, arrays and objects). `push_*`/`pull_*` descend into a
//! child and `pop` returns to the parent. The contract is object safe so
//! component containers can serialize themselves without knowing the
//! concrete format.

/// Cursor-based writer over a value tree
pub trait ArchiveWriter {
    /// Write null at the cursor
    fn null(&mut self);

    /// Write a boolean at the cursor
    fn boolean(&mut self, value: bool);

    /// Write a signed integer at the cursor
    fn int(&mut self, value: i64);

    /// Write an unsigned integer at the cursor
    fn uint(&mut self, value: u64);

    /// Write a floating point number at the cursor
    fn float(&mut self, value: f64);

    /// Write a string at the cursor
    fn string(&mut self, value: &str);

    /// Write a packed array of floats at the cursor
    fn typed_array_f32(&mut self, values: &[f32]);

    /// Turn the cursor into an (empty) array
    fn as_array(&mut self);

    /// Turn the cursor into an (empty) object
    fn as_object(&mut self);

    /// Append a new element to the array at the cursor and descend into it
    fn push_array_element(&mut self);

    /// Add a member to the object at the cursor and descend into it
    fn push_object_member(&mut self, name: &str);

    /// Return to the parent of the cursor
    fn pop(&mut self);
}

/// Cursor-based reader over a value tree
pub trait ArchiveReader {
    /// Whether the value at the cursor is null (or missing)
    fn is_null(&self) -> bool;

    fn boolean(&self) -> Option<bool>;

    fn int(&self) -> Option<i64>;

    fn uint(&self) -> Option<u64>;

    fn float(&self) -> Option<f64>;

    fn string(&self) -> Option<String>;

    fn is_array(&self) -> bool;

    /// Number of elements, if the cursor is an array
    fn array_size(&self) -> Option<usize>;

    fn is_object(&self) -> bool;

    /// Number of members, if the cursor is an object
    fn object_size(&self) -> Option<usize>;

    /// Call `f` with the reader positioned on each array element in turn
    fn enumerate_array_elements(&mut self, f: &mut dyn FnMut(usize, &mut dyn ArchiveReader));

    /// Call `f` with the reader positioned on each object member in turn
    fn enumerate_object_members(&mut self, f: &mut dyn FnMut(&str, &mut dyn ArchiveReader));

    /// Descend into the element at `index`. Returns false (and stays put) if
    /// there is no such element.
    fn pull_array_element(&mut self, index: usize) -> bool;

    /// Descend into the member `name`. Returns false (and stays put) if there
    /// is no such member.
    fn pull_object_member(&mut self, name: &str) -> bool;

    /// Return to the parent of the cursor
    fn pop(&mut self);
}

/// Types that can write themselves into an archive
pub trait ToArchive {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter);
}

/// Types that can read themselves from an archive.
///
/// Values that are missing or of the wrong kind leave `self` untouched.
pub trait FromArchive {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader);
}

impl dyn ArchiveWriter + '_ {
    /// Write `value` as the member `name` of the object at the cursor
    pub fn object_member<T: ToArchive + ?Sized>(&mut self, name: &str, value: &T) {
        self.push_object_member(name);
        value.to_archive(self);
        self.pop();
    }

    /// Write `value` as a new element of the array at the cursor
    pub fn array_element<T: ToArchive + ?Sized>(&mut self, value: &T) {
        self.push_array_element();
        value.to_archive(self);
        self.pop();
    }
}

impl dyn ArchiveReader + '_ {
    /// Read the member `name` of the object at the cursor into `value`.
    ///
    /// Returns false if the member does not exist.
    pub fn read_object_member<T: FromArchive + ?Sized>(&mut self, name: &str, value: &mut T) -> bool {
        if !self.pull_object_member(name) {
            return false;
        }

        value.from_archive(self);
        self.pop();
        true
    }
}

// ============================================================================
// Primitive implementations
// ============================================================================

impl ToArchive for bool {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.boolean(*self);
    }
}

impl FromArchive for bool {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        if let Some(value) = reader.boolean() {
            *self = value;
        }
    }
}

macro_rules! impl_archive_signed {
    ($($ty:ty),*) => {$(
        impl ToArchive for $ty {
            fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
                writer.int(*self as i64);
            }
        }

        impl FromArchive for $ty {
            fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
                if let Some(value) = reader.int().and_then(|v| <$ty>::try_from(v).ok()) {
                    *self = value;
                }
            }
        }
    )*};
}

macro_rules! impl_archive_unsigned {
    ($($ty:ty),*) => {$(
        impl ToArchive for $ty {
            fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
                writer.uint(*self as u64);
            }
        }

        impl FromArchive for $ty {
            fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
                if let Some(value) = reader.uint().and_then(|v| <$ty>::try_from(v).ok()) {
                    *self = value;
                }
            }
        }
    )*};
}

impl_archive_signed!(i8, i16, i32, i64);
impl_archive_unsigned!(u8, u16, u32, u64, usize);

impl ToArchive for f32 {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.float(f64::from(*self));
    }
}

impl FromArchive for f32 {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        if let Some(value) = reader.float() {
            *self = value as f32;
        }
    }
}

impl ToArchive for f64 {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.float(*self);
    }
}

impl FromArchive for f64 {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        if let Some(value) = reader.float() {
            *self = value;
        }
    }
}

impl ToArchive for str {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.string(self);
    }
}

impl ToArchive for String {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.string(self);
    }
}

impl FromArchive for String {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        if let Some(value) = reader.string() {
            *self = value;
        }
    }
}

impl<T: ToArchive> ToArchive for [T] {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.as_array();
        for value in self {
            writer.array_element(value);
        }
    }
}

impl<T: ToArchive> ToArchive for Vec<T> {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        self.as_slice().to_archive(writer);
    }
}

impl<T: FromArchive + Default> FromArchive for Vec<T> {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        if !reader.is_array() {
            return;
        }

        self.clear();
        reader.enumerate_array_elements(&mut |_, element| {
            let mut value = T::default();
            value.from_archive(element);
            self.push(value);
        });
    }
}

impl<T: ToArchive> ToArchive for Option<T> {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        match self {
            Some(value) => value.to_archive(writer),
            None => writer.null(),
        }
    }
}

impl<T: FromArchive + Default> FromArchive for Option<T> {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        if reader.is_null() {
            *self = None;
            return;
        }

        let mut value = T::default();
        value.from_archive(reader);
        *self = Some(value);
    }
}
