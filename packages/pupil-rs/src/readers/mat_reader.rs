/// MATLAB Run File Reader
///
/// Reads level-5 `.mat` files, including compressed variables and struct
/// arrays. The sample and timestamp arrays are located by dotted path
/// (`S.output.sample`); a top-level variable named after the last path
/// segment is accepted as well.
///
/// MATLAB v7.3 files are HDF5 containers and are rejected up front.
use super::mat5::{Mat5File, MatValue};
use super::{RunSignalReader, SignalFields, VariableInfo};
use crate::error::{PupilError, Result};
use crate::types::RunSignal;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// HDF5 magic number: 0x89 'H' 'D' 'F' '\r' '\n' 0x1a '\n'
const HDF5_MAGIC: [u8; 8] = [0x89, 0x48, 0x44, 0x46, 0x0d, 0x0a, 0x1a, 0x0a];
/// MATLAB v7.3 files carry a 512-byte user block before the HDF5 superblock
const HDF5_USER_BLOCK: usize = 512;

pub struct MatSignalReader {
    path: PathBuf,
    fields: SignalFields,
    mat_file: Mat5File,
}

impl MatSignalReader {
    pub fn new(path: &Path, fields: SignalFields) -> Result<Self> {
        if Self::is_hdf5_file(path)? {
            return Err(PupilError::UnsupportedFileType(format!(
                "{} is a MATLAB v7.3 (HDF5) file; re-save it with save(..., '-v7')",
                path.display()
            )));
        }

        let bytes = std::fs::read(path)?;
        let mat_file = Mat5File::parse(&bytes)
            .map_err(|e| PupilError::malformed(path.display().to_string(), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            fields,
            mat_file,
        })
    }

    fn is_hdf5_file(path: &Path) -> Result<bool> {
        let mut file = File::open(path)?;
        let mut head = Vec::with_capacity(HDF5_USER_BLOCK + HDF5_MAGIC.len());
        file.by_ref()
            .take((HDF5_USER_BLOCK + HDF5_MAGIC.len()) as u64)
            .read_to_end(&mut head)?;
        let at = |offset: usize| {
            head.get(offset..offset + HDF5_MAGIC.len()) == Some(&HDF5_MAGIC[..])
        };
        Ok(at(0) || at(HDF5_USER_BLOCK))
    }

    fn find(&self, path: &str) -> Result<Vec<f64>> {
        let value = self.mat_file.resolve(path).or_else(|| {
            path.rsplit('.')
                .next()
                .filter(|last| *last != path)
                .and_then(|last| self.mat_file.get(last))
        });

        match value {
            Some(MatValue::Numeric { data, .. }) => Ok(data.clone()),
            Some(other) => Err(PupilError::malformed(
                self.path.display().to_string(),
                format!("'{}' is a {} array, not numeric", path, other.class()),
            )),
            None => {
                let available: Vec<String> =
                    self.mat_file.leaves().into_iter().map(|(name, _)| name).collect();
                Err(PupilError::malformed(
                    self.path.display().to_string(),
                    format!(
                        "numeric variable '{}' not found (variables: {})",
                        path,
                        if available.is_empty() {
                            "none".to_string()
                        } else {
                            available.join(", ")
                        }
                    ),
                ))
            }
        }
    }
}

impl RunSignalReader for MatSignalReader {
    fn read_signal(&self, sample_rate: u32) -> Result<RunSignal> {
        let samples = self.find(&self.fields.sample)?;
        let timestamps = self.find(&self.fields.timestamp)?;
        RunSignal::new(samples, timestamps, sample_rate)
            .map_err(|e| PupilError::malformed(self.path.display().to_string(), e.to_string()))
    }

    fn variables(&self) -> Vec<VariableInfo> {
        self.mat_file
            .leaves()
            .into_iter()
            .map(|(name, value)| VariableInfo::new(&name, value.dims().to_vec(), value.class()))
            .collect()
    }

    fn format_name(&self) -> &str {
        "MAT"
    }
}
