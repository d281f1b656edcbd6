use mask_geometry::{MaskCommand, MaskError, MaskManager, NodeOutput, RatioOutput, Region, load_mask, save_mask};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    MaskError(#[from] MaskError),
    #[error("Job '{0}' writes a secondary mask but the command produced none")]
    MissingSecondaryOutput(String),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One mask operation: where to read, what to run, where to write
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Job {
    pub name: String,
    /// Primary mask image; optional only for blends
    pub input: Option<String>,
    /// Reference or second operand
    pub secondary: Option<String>,
    pub output: String,
    /// Where to write the secondary mask (inverse, crop boundary), if wanted
    pub secondary_output: Option<String>,
    pub command: MaskCommand,
}

/// A list of jobs run in order
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

/// Scalars reported by a finished job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobReport {
    pub name: String,
    pub command: String,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub width: u32,
    pub height: u32,
    pub center_x: u32,
    pub center_y: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<RatioOutput>,
}

impl JobReport {
    fn new(job: &Job, output: &NodeOutput) -> Self {
        Self {
            name: job.name.clone(),
            command: job.command.to_string(),
            canvas_width: output.canvas_width,
            canvas_height: output.canvas_height,
            width: output.width,
            height: output.height,
            center_x: output.center_x,
            center_y: output.center_y,
            flag: output.flag,
            ratio: output.ratio,
        }
    }
}

impl Job {
    /// Load the inputs, run the command and write the outputs
    pub fn run(&self, manager: &MaskManager) -> Result<JobReport, JobError> {
        let primary = self.input.as_deref().map(load_mask).transpose()?;
        let secondary = self.secondary.as_deref().map(load_mask).transpose()?;
        let output = manager.execute(&self.command, primary.as_ref(), secondary.as_ref())?;

        save_mask(&output.mask, &self.output)?;
        if let Some(path) = &self.secondary_output {
            let mask: &Region = output
                .secondary_mask
                .as_ref()
                .ok_or_else(|| JobError::MissingSecondaryOutput(self.name.clone()))?;
            save_mask(mask, path)?;
        }
        Ok(JobReport::new(self, &output))
    }
}

impl JobFile {
    /// Load a job file from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load a job file from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, JobError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a job file from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load a job file from a JSON string
    pub fn from_json(content: &str) -> Result<Self, JobError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load the jobs
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, JobError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(JobError::UnsupportedFileFormat),
        }
    }

    /// Convert the job file to a TOML string
    pub fn to_toml(&self) -> Result<String, JobError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert the job file to a JSON string
    pub fn to_json(&self) -> Result<String, JobError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Run every job in order, stopping at the first failure
    pub fn run(&self, manager: &MaskManager) -> Result<Vec<JobReport>, JobError> {
        self.jobs.iter().map(|job| job.run(manager)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mask_geometry::{BlendMode, BoundingBox, StructuringShape};

    const TOML_JOBS: &str = r#"
[[jobs]]
name = "grow"
input = "in.png"
output = "out.png"

[jobs.command]
type = "dilate"

[jobs.command.params]
iterations = 3
shape = "ellipse"

[[jobs]]
name = "center"
input = "in.png"
secondary = "ref.png"
output = "centered.png"

[jobs.command]
type = "align_center"
"#;

    #[test]
    fn parses_toml_jobs() {
        let file = JobFile::from_toml(TOML_JOBS).unwrap();
        assert_eq!(file.jobs.len(), 2);
        assert_eq!(
            file.jobs[0].command,
            MaskCommand::Dilate {
                iterations: 3,
                shape: StructuringShape::Ellipse
            }
        );
        assert_eq!(file.jobs[1].command, MaskCommand::AlignCenter);
        assert_eq!(file.jobs[1].secondary.as_deref(), Some("ref.png"));
    }

    #[test]
    fn json_and_toml_agree() {
        let file = JobFile::from_toml(TOML_JOBS).unwrap();
        let json = file.to_json().unwrap();
        assert_eq!(JobFile::from_json(&json).unwrap(), file);
        let toml = file.to_toml().unwrap();
        assert_eq!(JobFile::from_toml(&toml).unwrap(), file);
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(matches!(
            JobFile::from_file("jobs.yaml"),
            Err(JobError::UnsupportedFileFormat)
        ));
    }

    #[test]
    fn runs_job_end_to_end() {
        let dir = std::env::temp_dir().join(format!("maskgeo_cli_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let a = dir.join("a.png");
        let b = dir.join("b.png");
        save_mask(&Region::with_rect(32, 32, BoundingBox::new(0, 0, 15, 15).unwrap()), &a).unwrap();
        save_mask(&Region::with_rect(32, 32, BoundingBox::new(8, 8, 23, 23).unwrap()), &b).unwrap();

        let job = Job {
            name: "intersect".into(),
            input: Some(a.to_string_lossy().into_owned()),
            secondary: Some(b.to_string_lossy().into_owned()),
            output: dir.join("out.png").to_string_lossy().into_owned(),
            secondary_output: None,
            command: MaskCommand::Blend {
                mode: BlendMode::Intersect,
                bbox_mode: Default::default(),
                policy: Default::default(),
            },
        };
        let report = job.run(&MaskManager::new()).unwrap();
        assert_eq!((report.width, report.height), (8, 8));
        assert_eq!(report.command, "blend");
        assert_eq!(load_mask(dir.join("out.png")).unwrap().area(), 64);

        let missing = Job {
            secondary_output: Some(dir.join("none.png").to_string_lossy().into_owned()),
            ..job
        };
        assert!(matches!(
            missing.run(&MaskManager::new()),
            Err(JobError::MissingSecondaryOutput(_))
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
