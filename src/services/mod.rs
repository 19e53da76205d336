pub mod groundtruth;
pub mod images;
pub mod s3;
pub mod storage;
pub mod uploads;
