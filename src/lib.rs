/*!
The `rfcsv` crate provides streaming reading and writing of RFC 4180 CSV
data.

# Overview

The primary types in this crate are
[`Reader`](struct.Reader.html)
and
[`Writer`](struct.Writer.html),
for reading and writing CSV data respectively. Correspondingly, to configure
a CSV reader or writer, use a
[`ReaderBuilder`](struct.ReaderBuilder.html)
or a
[`WriterBuilder`](struct.WriterBuilder.html).

Records are represented by
[`StringRecord`](struct.StringRecord.html)
(fields are valid UTF-8) and
[`ByteRecord`](struct.ByteRecord.html)
(fields are arbitrary bytes). Both can be reused across reads so that a
read loop does not allocate per record.

The grammar is fixed: fields are separated by `,` and may be quoted with
`"`. A quoted field may contain commas, newlines and quotes, the last
written as `""`. The reader accepts `\r`, `\n` and `\r\n` as record
terminators. The writer ends records with `\n` unless a
[`Terminator`](enum.Terminator.html)
of `CRLF` is configured. Malformed quoting is an error
rather than something that is silently repaired.

The reader and writer are built on the I/O free parser and writer in the
[`rfcsv-core`](https://docs.rs/rfcsv-core)
crate, which can be used directly in `no_std` environments.

# Example

This example reads CSV data and writes it back out, normalizing the quoting
of every field.

```
use std::error::Error;

# fn main() { example().unwrap(); }
fn example() -> Result<(), Box<dyn Error>> {
    let data = "\
name,quote
\"Dr. Who\",\"he said \"\"hi\"\"\"
plain,\"no quotes needed\"
";
    let mut rdr = rfcsv::Reader::from_reader(data.as_bytes());
    let mut wtr = rfcsv::Writer::from_writer(vec![]);
    for result in rdr.records() {
        let record = result?;
        wtr.write_record(&record)?;
    }

    let out = String::from_utf8(wtr.into_inner()?)?;
    assert_eq!(out, "\
name,quote
Dr. Who,\"he said \"\"hi\"\"\"
plain,no quotes needed
");
    Ok(())
}
```

# Logging

The reader and writer emit [`tracing`](https://docs.rs/tracing) events at the
`debug` and `trace` levels, for example when a syntax error is found. No
subscriber is installed by this crate.

# Serde

With the default `serde` feature enabled, `StringRecord` implements
`Serialize` and `Deserialize` as a sequence of strings.
*/

#![deny(missing_docs)]

pub use rfcsv_core::{QuoteStyle, SyntaxError, Terminator};

pub use crate::byte_record::{ByteRecord, ByteRecordIter, Position};
pub use crate::error::{
    Error, FromUtf8Error, IntoInnerError, Result, Utf8Error,
};
pub use crate::reader::{
    ByteRecordsIntoIter, ByteRecordsIter, Reader, ReaderBuilder,
    StringRecordsIntoIter, StringRecordsIter,
};
pub use crate::string_record::{StringRecord, StringRecordIter};
pub use crate::writer::{Writer, WriterBuilder};

mod byte_record;
mod error;
mod reader;
#[cfg(feature = "serde")]
mod serde_impl;
mod string_record;
mod writer;
