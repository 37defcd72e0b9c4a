use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::string_record::StringRecord;

impl Serialize for StringRecord {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for field in self {
            seq.serialize_element(field)?;
        }
        seq.end()
    }
}
