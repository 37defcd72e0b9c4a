use std::fmt;

use serde::de::{Deserialize, Deserializer, SeqAccess, Visitor};

use crate::string_record::StringRecord;

impl<'de> Deserialize<'de> for StringRecord {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<StringRecord, D::Error> {
        deserializer.deserialize_seq(StringRecordVisitor)
    }
}

struct StringRecordVisitor;

impl<'de> Visitor<'de> for StringRecordVisitor {
    type Value = StringRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a sequence of strings")
    }

    fn visit_seq<A: SeqAccess<'de>>(
        self,
        mut seq: A,
    ) -> Result<StringRecord, A::Error> {
        let mut record = StringRecord::new();
        while let Some(field) = seq.next_element::<String>()? {
            record.push_field(&field);
        }
        Ok(record)
    }
}
