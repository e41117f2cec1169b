pub mod storage_name;
pub mod url;
