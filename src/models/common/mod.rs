pub mod collection;
pub mod record;

pub use collection::{Collection, Role};
pub use record::{
    ID_FIELD, Record, ensure_record_id, from_record, merge_fields, new_record_id, record_from_value,
    record_id, to_record,
};
