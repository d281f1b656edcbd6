use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr, VariantNames};

use crate::{
    algorithms::{
        CropExtend, EdgeExpansion, GrowBlurConfig, RatioOutput, StrokeSpec, align, align_horizontal_center,
        align_merged, apply_stroke, blend, crop_window, detect, dilate, erode, expand_edges, ratio_pixels,
        rectify,
    },
    error::{MaskError, Result},
    pipeline::Pipeline,
    region::Region,
    types::{AlignmentPolicy, Axes, BboxMode, BlendMode, StructuringShape},
};

fn default_trim_fraction() -> f64 {
    0.15
}

fn default_min_area_percent() -> f64 {
    3.0
}

fn default_ratio_grow() -> f64 {
    20.0
}

fn default_ratio_blur() -> f64 {
    5.0
}

/// One node invocation: which operation to run and its typed parameters.
#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema,
    Display, VariantNames, IntoStaticStr,
    PartialEq
)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MaskCommand {
    /// Grow the mask by a number of 3x3 passes
    Dilate {
        #[schemars(range(min = 0, max = 1000))]
        iterations: i32,
        #[serde(default)]
        shape: StructuringShape,
    },

    /// Shrink the mask by a number of 3x3 passes
    Erode {
        #[schemars(range(min = 0, max = 1000))]
        iterations: i32,
        #[serde(default)]
        shape: StructuringShape,
    },

    /// Percentage grow/shrink with optional hole filling and blur
    GrowBlur(GrowBlurConfig),

    /// Draw an outline band and composite it onto the mask
    Stroke(StrokeSpec),

    /// Move the mask onto the reference (secondary) center or the canvas center
    Align {
        #[serde(default)]
        horizontal: bool,
        #[serde(default)]
        vertical: bool,
        /// Output one solid box covering the reference and the aligned mask
        #[serde(default)]
        merge_bbox: bool,
    },

    /// Horizontally center a solid block on the reference (secondary) mask
    AlignCenter,

    /// Combine the primary and secondary masks
    Blend {
        #[serde(default)]
        mode: BlendMode,
        #[serde(default)]
        bbox_mode: BboxMode,
        #[serde(default)]
        policy: AlignmentPolicy,
    },

    /// Square off rounded corners
    Rectify {
        #[serde(default = "default_trim_fraction")]
        #[schemars(range(min = 0.01, max = 0.4))]
        trim_fraction: f64,
    },

    /// Move each bbox edge by a percentage and report the resulting box
    Analyze(EdgeExpansion),

    /// Report whether the mask holds anything
    Detect {
        #[serde(default = "default_min_area_percent")]
        #[schemars(range(min = 0.0, max = 10.0))]
        min_area_percent: f64,
    },

    /// Convert grow/blur percentages of the mask width into pixels
    Ratio {
        #[serde(default = "default_ratio_grow")]
        #[schemars(range(min = 0.0, max = 1000.0))]
        grow_percent: f64,
        #[serde(default = "default_ratio_blur")]
        #[schemars(range(min = 0.0, max = 1000.0))]
        blur_percent: f64,
    },

    /// Crop around the mask with extra margins, padding past the canvas
    Crop(CropExtend),
}

impl MaskCommand {
    /// Get the JSON schema for all commands
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MaskCommand)
    }

    /// Get a list of all available command names
    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Dilate { .. } => "Grow the occupied area by repeated 3x3 dilation",
            Self::Erode { .. } => "Shrink the occupied area by repeated 3x3 erosion",
            Self::GrowBlur(_) => "Grow or shrink by a percentage of the mask width, then optionally fill holes and blur",
            Self::Stroke(_) => "Add an external, internal or centered outline band to the mask",
            Self::Align { .. } => "Align the mask's bounding box to a reference mask or to the canvas center",
            Self::AlignCenter => "Replace the mask with a solid block horizontally centered on a reference mask",
            Self::Blend { .. } => "Union, subtract, intersect, exclude, xor or split two masks, with optional box harmonization",
            Self::Rectify { .. } => "Replace rounded corners with sharp ones by re-fitting the four sides",
            Self::Analyze(_) => "Expand or shrink each bounding box edge by a percentage and report canvas and box metrics",
            Self::Detect { .. } => "Report whether the mask is present, optionally above a minimum area ratio",
            Self::Ratio { .. } => "Convert grow and blur percentages of the mask width into pixel counts",
            Self::Crop(_) => "Crop around the mask with margins and mark the parts that fall off the canvas",
        }
    }

    /// Get parameter requirements for the command
    pub fn parameters_info(&self) -> Vec<(&'static str, &'static str, bool)> {
        match self {
            Self::Dilate { .. } | Self::Erode { .. } => vec![
                ("iterations", "Number of 3x3 passes (>= 0)", true),
                ("shape", "Structuring element: rectangle or ellipse", false),
            ],
            Self::GrowBlur(_) => vec![
                ("grow_percent", "Grow (+) or shrink (-) in percent of mask width (-500..1000)", true),
                ("blur_percent", "Blur kernel in percent of mask width (0..500)", true),
                ("fill_holes", "Close small holes after growing", false),
                ("rounded", "Use the ellipse element", false),
            ],
            Self::Stroke(_) => vec![
                ("width", "Band width in pixels or percent", true),
                ("placement", "external, internal or center", false),
                ("smoothing_radius", "Blur radius before re-binarizing the band", false),
                ("feather_radius", "Final soft-edge radius", false),
                ("unit", "pixels or percent of the shorter canvas side", false),
            ],
            Self::Align { .. } => vec![
                ("horizontal", "Align along x", false),
                ("vertical", "Align along y", false),
                ("merge_bbox", "Output the merged bounding box", false),
            ],
            Self::AlignCenter => vec![],
            Self::Blend { .. } => vec![
                ("mode", "union, subtract, intersect, exclude, xor, split_left, split_right, split_top, split_bottom", false),
                ("bbox_mode", "off, original, square_longer, square_shorter, square_width, square_height", false),
                ("policy", "Square placement: left, right, center, top, bottom", false),
            ],
            Self::Rectify { .. } => vec![
                ("trim_fraction", "Share of each edge ignored at both ends (0.01-0.4)", false),
            ],
            Self::Analyze(_) => vec![
                ("top", "Top edge percent (-90..1000)", false),
                ("bottom", "Bottom edge percent (-90..1000)", false),
                ("left", "Left edge percent (-90..1000)", false),
                ("right", "Right edge percent (-90..1000)", false),
            ],
            Self::Detect { .. } => vec![
                ("min_area_percent", "Minimum occupied share of the canvas; 0 disables (0-10)", false),
            ],
            Self::Ratio { .. } => vec![
                ("grow_percent", "Grow percent of mask width", false),
                ("blur_percent", "Blur percent of mask width", false),
            ],
            Self::Crop(_) => vec![
                ("top", "Top margin in pixels", false),
                ("bottom", "Bottom margin in pixels", false),
                ("left", "Left margin in pixels", false),
                ("right", "Right margin in pixels", false),
            ],
        }
    }

    /// One instance of every command, with default parameters
    pub fn all_defaults() -> Vec<Self> {
        vec![
            Self::Dilate {
                iterations: 1,
                shape: StructuringShape::default(),
            },
            Self::Erode {
                iterations: 1,
                shape: StructuringShape::default(),
            },
            Self::GrowBlur(GrowBlurConfig::default()),
            Self::Stroke(StrokeSpec::default()),
            Self::Align {
                horizontal: true,
                vertical: true,
                merge_bbox: false,
            },
            Self::AlignCenter,
            Self::Blend {
                mode: BlendMode::default(),
                bbox_mode: BboxMode::default(),
                policy: AlignmentPolicy::default(),
            },
            Self::Rectify {
                trim_fraction: default_trim_fraction(),
            },
            Self::Analyze(EdgeExpansion::default()),
            Self::Detect {
                min_area_percent: default_min_area_percent(),
            },
            Self::Ratio {
                grow_percent: default_ratio_grow(),
                blur_percent: default_ratio_blur(),
            },
            Self::Crop(CropExtend::default()),
        ]
    }

    /// Whether the command can run without a primary mask
    fn primary_optional(&self) -> bool {
        matches!(self, Self::Blend { .. })
    }
}

/// Everything a node hands back to the host.
///
/// `width`/`height` and the center describe the occupied area of `mask`
/// (or the canvas when it is empty) unless the command reports its own.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    pub mask: Region,
    pub secondary_mask: Option<Region>,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub width: u32,
    pub height: u32,
    pub center_x: u32,
    pub center_y: u32,
    pub flag: Option<bool>,
    pub ratio: Option<RatioOutput>,
}

impl NodeOutput {
    pub fn from_mask(mask: Region) -> Self {
        let (canvas_width, canvas_height) = mask.dimensions();
        let (width, height, (center_x, center_y)) = match mask.bounding_box() {
            Some(b) => (b.width(), b.height(), b.center()),
            None => (0, 0, (canvas_width / 2, canvas_height / 2)),
        };
        Self {
            mask,
            secondary_mask: None,
            canvas_width,
            canvas_height,
            width,
            height,
            center_x,
            center_y,
            flag: None,
            ratio: None,
        }
    }

    fn with_secondary(mut self, secondary: Region) -> Self {
        self.secondary_mask = Some(secondary);
        self
    }

    fn with_flag(mut self, flag: bool) -> Self {
        self.flag = Some(flag);
        self
    }
}

/// Keeps the last computed value and hands it back while pinned.
#[derive(Debug, Clone)]
pub struct Pinned<T> {
    last: Option<T>,
}

impl<T> Default for Pinned<T> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<T: Clone> Pinned<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&T> {
        self.last.as_ref()
    }

    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Return the cached value when `pinned` and one exists, otherwise
    /// compute, cache and return a fresh one.
    pub fn get_or_compute<E>(
        &mut self,
        pinned: bool,
        compute: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        if pinned {
            if let Some(last) = &self.last {
                return Ok(last.clone());
            }
        }
        let value = compute()?;
        self.last = Some(value.clone());
        Ok(value)
    }
}

/// One entry of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchItem {
    pub primary: Option<Region>,
    pub secondary: Option<Region>,
}

/// Executes [`MaskCommand`]s, optionally running a preparation pipeline on
/// the primary mask first.
#[derive(Clone)]
pub struct MaskManager {
    pipeline: Arc<Pipeline>,
}

impl MaskManager {
    pub fn new() -> Self {
        Self {
            pipeline: Arc::new(Pipeline::builder().build()),
        }
    }

    /// Create a new MaskManager that runs `pipeline` on every primary mask
    pub fn with_pipeline(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn execute(
        &self,
        command: &MaskCommand,
        primary: Option<&Region>,
        secondary: Option<&Region>,
    ) -> Result<NodeOutput> {
        let prepared = match primary {
            Some(region) if !self.pipeline.is_empty() => Some(self.pipeline.process(region)?),
            Some(region) => Some(region.clone()),
            None if command.primary_optional() => None,
            None => {
                return Err(MaskError::invalid(format!("command {command} needs a primary mask")));
            }
        };
        let name: &'static str = command.into();
        tracing::debug!(command = name, has_secondary = secondary.is_some(), "executing mask command");

        let Some(region) = prepared.as_ref() else {
            return self.run_blend(command, None, secondary);
        };

        let output = match command {
            MaskCommand::Dilate { iterations, shape } => {
                NodeOutput::from_mask(dilate(region, *iterations, *shape)?)
            }
            MaskCommand::Erode { iterations, shape } => {
                NodeOutput::from_mask(erode(region, *iterations, *shape)?)
            }
            MaskCommand::GrowBlur(config) => {
                let (mask, inverted) = config.run(region)?;
                NodeOutput::from_mask(mask).with_secondary(inverted)
            }
            MaskCommand::Stroke(spec) => NodeOutput::from_mask(apply_stroke(region, spec)?),
            MaskCommand::Align {
                horizontal,
                vertical,
                merge_bbox,
            } => {
                let axes = Axes {
                    horizontal: *horizontal,
                    vertical: *vertical,
                };
                let aligned = if *merge_bbox {
                    align_merged(region, secondary, axes)?
                } else {
                    align(region, secondary, axes)?
                };
                NodeOutput::from_mask(aligned)
            }
            MaskCommand::AlignCenter => {
                let reference = secondary.ok_or_else(|| {
                    MaskError::invalid("align_center needs a reference (secondary) mask")
                })?;
                NodeOutput::from_mask(align_horizontal_center(region, reference)?)
            }
            MaskCommand::Blend { .. } => return self.run_blend(command, Some(region), secondary),
            MaskCommand::Rectify { trim_fraction } => {
                NodeOutput::from_mask(rectify(region, *trim_fraction)?)
            }
            MaskCommand::Analyze(expansion) => {
                let analysis = expand_edges(region, *expansion)?;
                NodeOutput {
                    mask: analysis.mask,
                    secondary_mask: None,
                    canvas_width: analysis.canvas_width,
                    canvas_height: analysis.canvas_height,
                    width: analysis.mask_width,
                    height: analysis.mask_height,
                    center_x: analysis.center_x,
                    center_y: analysis.center_y,
                    flag: None,
                    ratio: None,
                }
            }
            MaskCommand::Detect { min_area_percent } => {
                let present = detect(region, *min_area_percent);
                NodeOutput::from_mask(region.clone()).with_flag(present)
            }
            MaskCommand::Ratio {
                grow_percent,
                blur_percent,
            } => {
                let mut output = NodeOutput::from_mask(region.clone());
                output.ratio = Some(ratio_pixels(region, *grow_percent, *blur_percent));
                output
            }
            MaskCommand::Crop(extend) => {
                let window = crop_window(region, *extend)?;
                let out_of_bounds = window.out_of_bounds();
                let cropped = window.apply(region, 0.0);
                NodeOutput::from_mask(cropped)
                    .with_secondary(window.boundary)
                    .with_flag(out_of_bounds)
            }
        };
        Ok(output)
    }

    fn run_blend(
        &self,
        command: &MaskCommand,
        primary: Option<&Region>,
        secondary: Option<&Region>,
    ) -> Result<NodeOutput> {
        let MaskCommand::Blend {
            mode,
            bbox_mode,
            policy,
        } = command
        else {
            return Err(MaskError::invalid(format!("command {command} is not a blend")));
        };
        let blended = blend(primary, secondary, *mode, *bbox_mode, *policy)?;
        let mut output = NodeOutput::from_mask(blended.mask);
        output.width = blended.width;
        output.height = blended.height;
        Ok(output)
    }

    /// Like [`execute`](Self::execute), but hands back the cached output while
    /// `pinned` is set.
    pub fn execute_pinned(
        &self,
        cache: &mut Pinned<NodeOutput>,
        pinned: bool,
        command: &MaskCommand,
        primary: Option<&Region>,
        secondary: Option<&Region>,
    ) -> Result<NodeOutput> {
        cache.get_or_compute(pinned, || self.execute(command, primary, secondary))
    }

    /// Run the same command over every item, in order.
    pub fn execute_batch(&self, command: &MaskCommand, items: &[BatchItem]) -> Result<Vec<NodeOutput>> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.execute(command, item.primary.as_ref(), item.secondary.as_ref())
                    .inspect_err(|err| tracing::warn!(index, %err, "batch item failed"))
            })
            .collect()
    }
}

impl Default for MaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, StrokePlacement};

    fn rect(x0: u32, y0: u32, x1: u32, y1: u32) -> Region {
        Region::with_rect(64, 64, BoundingBox::new(x0, y0, x1, y1).unwrap())
    }

    #[test]
    fn command_round_trips_through_json() {
        let command = MaskCommand::Blend {
            mode: BlendMode::SplitLeft,
            bbox_mode: BboxMode::SquareLonger,
            policy: AlignmentPolicy::Top,
        };
        let json = serde_json::to_string(&command).unwrap();
        assert!(json.contains("\"type\":\"blend\""));
        assert!(json.contains("\"split_left\""));
        let back: MaskCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn defaults_fill_missing_params() {
        let command: MaskCommand =
            serde_json::from_str(r#"{"type":"rectify","params":{}}"#).unwrap();
        assert_eq!(command, MaskCommand::Rectify { trim_fraction: 0.15 });
        let command: MaskCommand = serde_json::from_str(r#"{"type":"align_center"}"#).unwrap();
        assert_eq!(command, MaskCommand::AlignCenter);
    }

    #[test]
    fn command_names_are_snake_case() {
        let names = MaskCommand::command_names();
        assert!(names.contains(&"grow_blur"));
        assert!(names.contains(&"align_center"));
        assert_eq!(names.len(), 12);
        assert_eq!(MaskCommand::AlignCenter.to_string(), "align_center");
    }

    #[test]
    fn defaults_cover_every_command_in_order() {
        let names: Vec<String> = MaskCommand::all_defaults().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, MaskCommand::command_names());
    }

    #[test]
    fn schema_lists_every_command() {
        let schema = serde_json::to_string(&MaskCommand::schema()).unwrap();
        for name in MaskCommand::command_names() {
            assert!(schema.contains(name), "schema is missing {name}");
        }
    }

    #[test]
    fn missing_primary_is_rejected() {
        let manager = MaskManager::new();
        let command = MaskCommand::Dilate {
            iterations: 1,
            shape: StructuringShape::Rectangle,
        };
        assert!(matches!(
            manager.execute(&command, None, None),
            Err(MaskError::InvalidParameter(_))
        ));
    }

    #[test]
    fn blend_runs_without_inputs() {
        let manager = MaskManager::new();
        let command = MaskCommand::Blend {
            mode: BlendMode::Union,
            bbox_mode: BboxMode::Off,
            policy: AlignmentPolicy::Center,
        };
        let out = manager.execute(&command, None, None).unwrap();
        assert_eq!(out.mask.dimensions(), (1024, 1024));
        assert_eq!((out.width, out.height), (0, 0));
    }

    #[test]
    fn grow_blur_returns_inverse() {
        let manager = MaskManager::new();
        let command = MaskCommand::GrowBlur(GrowBlurConfig::default());
        let out = manager.execute(&command, Some(&rect(10, 10, 19, 19)), None).unwrap();
        let inverted = out.secondary_mask.unwrap();
        assert_eq!(inverted.get(0, 0), 1.0);
        assert_eq!(inverted.get(15, 15), 0.0);
    }

    #[test]
    fn detect_sets_flag() {
        let manager = MaskManager::new();
        let command = MaskCommand::Detect { min_area_percent: 0.0 };
        let present = manager.execute(&command, Some(&rect(1, 1, 2, 2)), None).unwrap();
        assert_eq!(present.flag, Some(true));
        let absent = manager.execute(&command, Some(&Region::new(8, 8)), None).unwrap();
        assert_eq!(absent.flag, Some(false));
        assert_eq!((absent.center_x, absent.center_y), (4, 4));
    }

    #[test]
    fn crop_of_empty_mask_surfaces_error() {
        let manager = MaskManager::new();
        let command = MaskCommand::Crop(CropExtend::default());
        assert!(matches!(
            manager.execute(&command, Some(&Region::new(8, 8)), None),
            Err(MaskError::EmptyRegion(_))
        ));
    }

    #[test]
    fn manager_pipeline_runs_first() {
        let pipeline = Pipeline::builder()
            .grow(1, StructuringShape::Rectangle)
            .build();
        let manager = MaskManager::with_pipeline(pipeline);
        let command = MaskCommand::Stroke(StrokeSpec::new(0, StrokePlacement::External));
        let out = manager.execute(&command, Some(&rect(10, 10, 19, 19)), None).unwrap();
        assert_eq!((out.width, out.height), (12, 12));
    }

    #[test]
    fn pinned_returns_cached_value() {
        let mut cache = Pinned::new();
        let first: std::result::Result<i32, MaskError> = cache.get_or_compute(true, || Ok(1));
        assert_eq!(first.unwrap(), 1);
        let second: std::result::Result<i32, MaskError> = cache.get_or_compute(true, || Ok(2));
        assert_eq!(second.unwrap(), 1);
        let third: std::result::Result<i32, MaskError> = cache.get_or_compute(false, || Ok(3));
        assert_eq!(third.unwrap(), 3);
        assert_eq!(cache.last(), Some(&3));
    }

    #[test]
    fn pinned_execution_skips_recompute() {
        let manager = MaskManager::new();
        let mut cache = Pinned::new();
        let command = MaskCommand::Detect { min_area_percent: 0.0 };
        let first = manager
            .execute_pinned(&mut cache, true, &command, Some(&rect(0, 0, 3, 3)), None)
            .unwrap();
        let second = manager
            .execute_pinned(&mut cache, true, &command, Some(&Region::new(64, 64)), None)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.flag, Some(true));
    }

    #[test]
    fn batch_preserves_order() {
        let manager = MaskManager::new();
        let command = MaskCommand::Detect { min_area_percent: 0.0 };
        let items = vec![
            BatchItem {
                primary: Some(Region::new(8, 8)),
                secondary: None,
            },
            BatchItem {
                primary: Some(rect(0, 0, 1, 1)),
                secondary: None,
            },
        ];
        let outputs = manager.execute_batch(&command, &items).unwrap();
        let flags: Vec<Option<bool>> = outputs.iter().map(|o| o.flag).collect();
        assert_eq!(flags, vec![Some(false), Some(true)]);
    }
}
