use pupil_rs::PupilError;

pub const SUCCESS: i32 = 0;
pub const EXECUTION_ERROR: i32 = 1;
pub const INPUT_ERROR: i32 = 2;
/// Some runs failed or were skipped but at least one file was written
pub const PARTIAL_FAILURE: i32 = 3;
/// Subject selection was abandoned
pub const CANCELLED: i32 = 4;

pub fn for_error(err: &PupilError) -> i32 {
    match err {
        PupilError::Csv(_) | PupilError::IoError(_) => EXECUTION_ERROR,
        _ => INPUT_ERROR,
    }
}
