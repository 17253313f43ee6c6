mod record;

pub use self::record::DedupRecord;
pub(crate) use self::record::RecordRow;
