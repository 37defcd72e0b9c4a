/*!
`rfcsv-core` provides a streaming, allocation free parser and writer for
RFC 4180 CSV data.

The parser and writer never perform I/O. Callers hand them slices of input
and slices of output, and they report how much of each was used along with
what happened (a field ended, a record ended, the output is full, and so on).
The `rfcsv` crate builds its `io::Read` and `io::Write` based reader and
writer on top of these.

The grammar is fixed: fields are separated by `,`, quoted with `"`, and a
quote inside a quoted field is escaped by doubling it. The reader ends a
record at any of `\r`, `\n` or `\r\n`. The writer ends records with `\n`
unless `Terminator::CRLF` is configured.

# Example: counting fields and records

```
use rfcsv_core::{ReadFieldResult, Reader};

let data = "foo,bar,baz\na,b,c\n\"x,y\",\"line 1\nline 2\"\n";
let mut rdr = Reader::new();
let mut bytes = data.as_bytes();
let mut field = [0u8; 64];
let (mut nfields, mut nrecords) = (0, 0);
loop {
    let (res, nin, _) = rdr.read_field(bytes, &mut field);
    bytes = &bytes[nin..];
    match res {
        ReadFieldResult::InputEmpty => {}
        ReadFieldResult::OutputFull => panic!("field too large"),
        ReadFieldResult::Field { record_end } => {
            nfields += 1;
            if record_end {
                nrecords += 1;
            }
        }
        ReadFieldResult::End => break,
        ReadFieldResult::Error(err) => panic!("{}", err),
    }
}
assert_eq!(8, nfields);
assert_eq!(3, nrecords);
```
*/

#![deny(missing_docs)]
#![no_std]

#[cfg(test)]
extern crate std;

pub use crate::reader::{
    ReadFieldResult, ReadRecordResult, Reader, SyntaxError,
};
pub use crate::writer::{
    quote, QuoteStyle, WriteResult, Writer, WriterBuilder,
};

mod reader;
mod writer;

/// The field delimiter. This is not configurable.
pub const DELIMITER: u8 = b',';

/// The quote character. This is not configurable.
pub const QUOTE: u8 = b'"';

/// A record terminator used when writing CSV.
///
/// The reader always accepts `\r`, `\n` and `\r\n` as terminators, so this
/// only selects what the writer emits. The default is `Terminator::LF`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Terminator {
    /// `\n`.
    LF,
    /// `\r\n`.
    CRLF,
}

impl Default for Terminator {
    fn default() -> Terminator {
        Terminator::LF
    }
}
