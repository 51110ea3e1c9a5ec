//! Run record formats.

use std::error::Error;
use std::io;
use std::io::prelude::*;

/// Record format interface. Defines how records are stored in run files.
pub trait RunFormat<T> {
    type SerializationError: Error + Send + Sync + 'static;
    type DeserializationError: Error + Send + Sync + 'static;

    /// Writes a single record.
    fn write_record<W: Write>(writer: &mut W, item: &T) -> Result<(), Self::SerializationError>;

    /// Reads the next record. Returns [`None`] when the reader is exhausted.
    fn read_record<R: BufRead>(reader: &mut R) -> Option<Result<T, Self::DeserializationError>>;
}

/// RMP (Rust MessagePack) record format.
/// It uses MessagePack as a data serialization format and supports any `serde` type.
/// For more information see https://msgpack.org/.
#[derive(Debug, Clone, Copy, Default)]
pub struct RmpFormat;

impl<T> RunFormat<T> for RmpFormat
where
    T: serde::ser::Serialize + serde::de::DeserializeOwned,
{
    type SerializationError = rmp_serde::encode::Error;
    type DeserializationError = rmp_serde::decode::Error;

    fn write_record<W: Write>(writer: &mut W, item: &T) -> Result<(), Self::SerializationError> {
        rmp_serde::encode::write(writer, item)
    }

    fn read_record<R: BufRead>(reader: &mut R) -> Option<Result<T, Self::DeserializationError>> {
        let exhausted = match reader.fill_buf() {
            Ok(buf) => buf.is_empty(),
            Err(err) => return Some(Err(rmp_serde::decode::Error::InvalidDataRead(err))),
        };

        if exhausted {
            None
        } else {
            Some(rmp_serde::decode::from_read(reader))
        }
    }
}

/// Newline delimited text format.
/// Each record is a `\n` terminated line, so the run file of a sorted text stream is the sorted text itself.
/// Records containing `\n` are rejected with [`io::ErrorKind::InvalidInput`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LinesFormat;

impl RunFormat<String> for LinesFormat {
    type SerializationError = io::Error;
    type DeserializationError = io::Error;

    fn write_record<W: Write>(writer: &mut W, item: &String) -> Result<(), Self::SerializationError> {
        if item.as_bytes().contains(&b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "line record contains a line feed",
            ));
        }

        writer.write_all(item.as_bytes())?;
        writer.write_all(b"\n")
    }

    fn read_record<R: BufRead>(reader: &mut R) -> Option<Result<String, Self::DeserializationError>> {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                }
                Some(Ok(line))
            }
            Err(err) => Some(Err(err)),
        }
    }
}
