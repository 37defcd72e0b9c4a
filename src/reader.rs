use std::cmp;
use std::fs::File;
use std::io::{self, BufRead};
use std::iter::FusedIterator;
use std::path::Path;

use rfcsv_core::{ReadRecordResult, Reader as CoreReader};
use tracing::{debug, trace};

use crate::byte_record::{ByteRecord, Position};
use crate::error::{Error, Result};
use crate::string_record::StringRecord;

/// Builds a CSV reader with various configuration knobs.
///
/// This builder can be used to tweak the size of the internal buffer. Once a CSV `Reader` is built, its configuration
/// cannot be changed.
#[derive(Debug)]
pub struct ReaderBuilder {
    capacity: usize,
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder {
            capacity: 8 * (1 << 10),
        }
    }
}

impl ReaderBuilder {
    /// Create a new builder for configuring CSV parsing.
    ///
    /// To convert a builder into a reader, call one of the methods starting
    /// with `from_`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use rfcsv::{ReaderBuilder, StringRecord};
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let data = "\
    /// city,country,pop
    /// Boston,United States,4628910
    /// Concord,United States,42695
    /// ";
    ///     let mut rdr = ReaderBuilder::new().from_reader(data.as_bytes());
    ///
    ///     let records = rdr
    ///         .records()
    ///         .collect::<Result<Vec<StringRecord>, rfcsv::Error>>()?;
    ///     assert_eq!(records, vec![
    ///         vec!["city", "country", "pop"],
    ///         vec!["Boston", "United States", "4628910"],
    ///         vec!["Concord", "United States", "42695"],
    ///     ]);
    ///     Ok(())
    /// }
    /// ```
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV parser from this configuration that reads data from the
    /// given file path.
    ///
    /// If there was a problem opening the file at the given path, then this
    /// returns the corresponding error. The file is closed when the reader
    /// is dropped.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Reader<File>> {
        Ok(Reader::new(self, File::open(path)?))
    }

    /// Build a CSV parser from this configuration that reads data from `rdr`.
    ///
    /// Note that the CSV reader is buffered automatically, so you should not
    /// wrap `rdr` in a buffered reader like `io::BufReader`.
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Reader<R> {
        Reader::new(self, rdr)
    }

    /// Set the capacity (in bytes) of the buffer used in the CSV reader.
    /// This defaults to a reasonable setting.
    ///
    /// A capacity of `0` is treated as `1`.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.capacity = capacity;
        self
    }
}

/// A already configured CSV reader.
///
/// A CSV reader takes as input CSV data and transforms that into a lazy,
/// forward-only sequence of records. Each record is an ordered sequence of
/// fields. Records may have different numbers of fields.
///
/// The grammar is RFC 4180: fields are separated by `,`, a field may be
/// quoted with `"` in which case it may contain `,`, `"` (written as `""`)
/// and newlines. Any of `\r`, `\n` or `\r\n` ends a record. An empty line
/// is a record with a single empty field, and a trailing record terminator
/// at the end of the data does not produce an extra record.
///
/// The reader is buffered internally and only ever holds the record being
/// parsed, so memory use is bounded by the size of the largest record rather
/// than the size of the data.
///
/// # Errors
///
/// Malformed quoting (data after the closing quote of a field) and a quoted
/// field left open at the end of the data are reported as
/// [`Error::Syntax`](enum.Error.html#variant.Syntax). The partial record is
/// discarded and the reader is finished: subsequent reads report the end of
/// data. I/O errors are passed through as
/// [`Error::Io`](enum.Error.html#variant.Io).
#[derive(Debug)]
pub struct Reader<R> {
    /// The underlying CSV parser.
    core: CoreReader,
    /// The underlying reader.
    rdr: io::BufReader<R>,
    /// Various state tracking.
    state: ReaderState,
}

#[derive(Debug)]
struct ReaderState {
    /// The current position of the parser.
    ///
    /// Note that this position is only observable by callers at the start
    /// of a record. More granular positions are not supported.
    cur_pos: Position,
    /// Whether the reader has been exhausted, either by reaching the end of
    /// the data or by failing.
    eof: ReaderEofState,
}

/// Whether EOF of the underlying reader has been reached or not.
///
/// I/O errors and syntax errors both put the reader in a state that
/// returns no more records.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReaderEofState {
    NotEof,
    Eof,
    IOError,
    SyntaxError,
}

impl Reader<File> {
    /// Create a new CSV parser with a default configuration for the given
    /// file path.
    ///
    /// To customize CSV parsing, use a `ReaderBuilder`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Reader<File>> {
        ReaderBuilder::new().from_path(path)
    }
}

impl<R: io::Read> Reader<R> {
    /// Create a new CSV reader given a builder and a source of underlying
    /// bytes.
    fn new(builder: &ReaderBuilder, rdr: R) -> Reader<R> {
        Reader {
            core: CoreReader::new(),
            rdr: io::BufReader::with_capacity(
                cmp::max(1, builder.capacity),
                rdr,
            ),
            state: ReaderState {
                cur_pos: Position::new(),
                eof: ReaderEofState::NotEof,
            },
        }
    }

    /// Create a new CSV parser with a default configuration for the given
    /// reader.
    ///
    /// To customize CSV parsing, use a `ReaderBuilder`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use rfcsv::Reader;
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let data = "a,\"b,c\"\nd,e\n";
    ///     let mut rdr = Reader::from_reader(data.as_bytes());
    ///     for result in rdr.records() {
    ///         let record = result?;
    ///         assert_eq!(record.len(), 2);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn from_reader(rdr: R) -> Reader<R> {
        ReaderBuilder::new().from_reader(rdr)
    }

    /// Returns a borrowed iterator over all records as strings.
    ///
    /// Each item yielded by this iterator is a `Result<StringRecord, Error>`.
    /// Therefore, in order to access the record, callers must handle the
    /// possibility of error (typically with `?`).
    ///
    /// Once an error has been yielded, the iterator yields nothing else.
    pub fn records(&mut self) -> StringRecordsIter<'_, R> {
        StringRecordsIter::new(self)
    }

    /// Returns an owned iterator over all records as strings.
    ///
    /// This is mostly useful when you want to return a CSV iterator or store
    /// it somewhere.
    pub fn into_records(self) -> StringRecordsIntoIter<R> {
        StringRecordsIntoIter::new(self)
    }

    /// Returns a borrowed iterator over all records as raw bytes.
    ///
    /// Each item yielded by this iterator is a `Result<ByteRecord, Error>`.
    /// Therefore, in order to access the record, callers must handle the
    /// possibility of error (typically with `?`).
    pub fn byte_records(&mut self) -> ByteRecordsIter<'_, R> {
        ByteRecordsIter::new(self)
    }

    /// Returns an owned iterator over all records as raw bytes.
    pub fn into_byte_records(self) -> ByteRecordsIntoIter<R> {
        ByteRecordsIntoIter::new(self)
    }

    /// Read a single row into the given record. Returns false when no more
    /// records could be read.
    ///
    /// This method is useful when you want to read records as fast as
    /// possible. It's less ergonomic than an iterator, but it permits the
    /// caller to reuse the `StringRecord` allocation, which usually results
    /// in higher throughput.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use rfcsv::{Reader, StringRecord};
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let data = "\
    /// he said \"hi\",x
    /// \"he said \"\"hi\"\"\",x
    /// ";
    ///     let mut rdr = Reader::from_reader(data.as_bytes());
    ///     let mut record = StringRecord::new();
    ///
    ///     assert!(rdr.read_record(&mut record)?);
    ///     assert_eq!(record, vec!["he said \"hi\"", "x"]);
    ///     assert!(rdr.read_record(&mut record)?);
    ///     assert_eq!(record, vec!["he said \"hi\"", "x"]);
    ///     assert!(!rdr.read_record(&mut record)?);
    ///     Ok(())
    /// }
    /// ```
    pub fn read_record(&mut self, record: &mut StringRecord) -> Result<bool> {
        record.read(self)
    }

    /// Read a single row into the given byte record. Returns false when no
    /// more records could be read.
    ///
    /// This method is useful when you want to read records as fast as
    /// possible. It's less ergonomic than an iterator, but it permits the
    /// caller to reuse the `ByteRecord` allocation, which usually results
    /// in higher throughput.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use rfcsv::{ByteRecord, Reader};
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let data = "a,\"line1\nline2\",c\n";
    ///     let mut rdr = Reader::from_reader(data.as_bytes());
    ///     let mut record = ByteRecord::new();
    ///
    ///     assert!(rdr.read_byte_record(&mut record)?);
    ///     assert_eq!(record, vec!["a", "line1\nline2", "c"]);
    ///     assert!(!rdr.read_byte_record(&mut record)?);
    ///     Ok(())
    /// }
    /// ```
    pub fn read_byte_record(
        &mut self,
        record: &mut ByteRecord,
    ) -> Result<bool> {
        let start = self.state.cur_pos.clone();
        record.clear();
        record.set_position(Some(start.clone()));
        if self.state.eof != ReaderEofState::NotEof {
            return Ok(false);
        }
        let (mut outlen, mut endlen) = (0, 0);
        loop {
            let (res, nin, nout, nend) = {
                let input = match self.rdr.fill_buf() {
                    Ok(input) => input,
                    Err(err) => {
                        self.state.eof = ReaderEofState::IOError;
                        record.clear();
                        return Err(Error::Io(err));
                    }
                };
                let (fields, ends) = record.as_parts();
                self.core.read_record(
                    input,
                    &mut fields[outlen..],
                    &mut ends[endlen..],
                )
            };
            self.rdr.consume(nin);
            let byte = self.state.cur_pos.byte();
            self.state
                .cur_pos
                .set_byte(byte + nin as u64)
                .set_line(self.core.line());
            outlen += nout;
            endlen += nend;
            match res {
                ReadRecordResult::InputEmpty => continue,
                ReadRecordResult::OutputFull => {
                    record.expand_fields();
                    continue;
                }
                ReadRecordResult::OutputEndsFull => {
                    record.expand_ends();
                    continue;
                }
                ReadRecordResult::Record => {
                    record.set_len(endlen);
                    let next = self.state.cur_pos.record() + 1;
                    self.state.cur_pos.set_record(next);
                    return Ok(true);
                }
                ReadRecordResult::End => {
                    self.state.eof = ReaderEofState::Eof;
                    trace!(
                        records = self.state.cur_pos.record(),
                        bytes = self.state.cur_pos.byte(),
                        "reached end of CSV data"
                    );
                    return Ok(false);
                }
                ReadRecordResult::Error(err) => {
                    self.state.eof = ReaderEofState::SyntaxError;
                    let pos = start;
                    record.clear();
                    debug!(
                        record = pos.record(),
                        line = pos.line(),
                        byte = pos.byte(),
                        error = %err,
                        "CSV syntax error"
                    );
                    return Err(Error::Syntax { pos, err });
                }
            }
        }
    }

    /// Return the current position of this CSV reader.
    ///
    /// The byte offset in the position returned can be used to `seek` this
    /// reader's underlying input. In particular, the position returned
    /// always points to the start of the next record to be read.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use rfcsv::{Position, Reader};
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let data = "a,b,c\n\"x\ny\",z\nfoo\n";
    ///     let mut rdr = Reader::from_reader(data.as_bytes());
    ///     let mut iter = rdr.records();
    ///     iter.next().expect("a record")?;
    ///     iter.next().expect("a record")?;
    ///
    ///     let pos = rdr.position();
    ///     assert_eq!(pos.byte(), 14);
    ///     assert_eq!(pos.line(), 4);
    ///     assert_eq!(pos.record(), 2);
    ///     Ok(())
    /// }
    /// ```
    #[inline]
    pub fn position(&self) -> &Position {
        &self.state.cur_pos
    }

    /// Returns true if and only if this reader will not yield any more
    /// records, either because it reached the end of its input or because it
    /// failed.
    ///
    /// Note that this only becomes true after a read has observed the end of
    /// the data.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state.eof != ReaderEofState::NotEof
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.rdr.get_ref()
    }

    /// Returns a mutable reference to the underlying reader.
    ///
    /// Reading from the underlying reader directly skips the reader's
    /// internal buffer and will confuse the parser.
    pub fn get_mut(&mut self) -> &mut R {
        self.rdr.get_mut()
    }

    /// Unwraps this CSV reader, returning the underlying reader.
    ///
    /// Note that any leftover data inside this reader's internal buffer is
    /// lost.
    pub fn into_inner(self) -> R {
        self.rdr.into_inner()
    }
}

/// An owned iterator over records as strings.
pub struct StringRecordsIntoIter<R> {
    rdr: Reader<R>,
    rec: StringRecord,
    done: bool,
}

impl<R: io::Read> StringRecordsIntoIter<R> {
    fn new(rdr: Reader<R>) -> StringRecordsIntoIter<R> {
        StringRecordsIntoIter { rdr, rec: StringRecord::new(), done: false }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Return a mutable reference to the underlying CSV reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.rdr
    }

    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for StringRecordsIntoIter<R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        if self.done {
            return None;
        }
        match self.rdr.read_record(&mut self.rec) {
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<R: io::Read> FusedIterator for StringRecordsIntoIter<R> {}

/// A borrowed iterator over records as strings.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct StringRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    rec: StringRecord,
    done: bool,
}

impl<'r, R: io::Read> StringRecordsIter<'r, R> {
    fn new(rdr: &'r mut Reader<R>) -> StringRecordsIter<'r, R> {
        StringRecordsIter { rdr, rec: StringRecord::new(), done: false }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Return a mutable reference to the underlying CSV reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.rdr
    }
}

impl<'r, R: io::Read> Iterator for StringRecordsIter<'r, R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        if self.done {
            return None;
        }
        match self.rdr.read_record(&mut self.rec) {
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<'r, R: io::Read> FusedIterator for StringRecordsIter<'r, R> {}

/// An owned iterator over records as raw bytes.
pub struct ByteRecordsIntoIter<R> {
    rdr: Reader<R>,
    rec: ByteRecord,
    done: bool,
}

impl<R: io::Read> ByteRecordsIntoIter<R> {
    fn new(rdr: Reader<R>) -> ByteRecordsIntoIter<R> {
        ByteRecordsIntoIter { rdr, rec: ByteRecord::new(), done: false }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Return a mutable reference to the underlying CSV reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.rdr
    }

    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for ByteRecordsIntoIter<R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        if self.done {
            return None;
        }
        match self.rdr.read_byte_record(&mut self.rec) {
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<R: io::Read> FusedIterator for ByteRecordsIntoIter<R> {}

/// A borrowed iterator over records as raw bytes.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct ByteRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    rec: ByteRecord,
    done: bool,
}

impl<'r, R: io::Read> ByteRecordsIter<'r, R> {
    fn new(rdr: &'r mut Reader<R>) -> ByteRecordsIter<'r, R> {
        ByteRecordsIter { rdr, rec: ByteRecord::new(), done: false }
    }

    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Return a mutable reference to the underlying CSV reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.rdr
    }
}

impl<'r, R: io::Read> Iterator for ByteRecordsIter<'r, R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        if self.done {
            return None;
        }
        match self.rdr.read_byte_record(&mut self.rec) {
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<'r, R: io::Read> FusedIterator for ByteRecordsIter<'r, R> {}
