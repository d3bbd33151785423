use std::fmt;
use std::str::FromStr;

use crate::detection::domain::detected_face::DetectedFace;

/// Which detected target faces receive the donor identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TargetFacePolicy {
    /// Only the primary (highest-scoring) target face.
    #[default]
    SingleTargetFace,
    /// Every detected target face, in detector order.
    AllTargetFaces,
}

impl TargetFacePolicy {
    pub const ALL: &[TargetFacePolicy] = &[
        TargetFacePolicy::SingleTargetFace,
        TargetFacePolicy::AllTargetFaces,
    ];

    /// Faces to swap, in the order the swaps are applied.
    pub fn select<'a>(&self, faces: &'a [DetectedFace]) -> &'a [DetectedFace] {
        match self {
            TargetFacePolicy::SingleTargetFace => &faces[..faces.len().min(1)],
            TargetFacePolicy::AllTargetFaces => faces,
        }
    }
}

impl fmt::Display for TargetFacePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetFacePolicy::SingleTargetFace => "single-target-face",
            TargetFacePolicy::AllTargetFaces => "all-target-faces",
        };
        f.write_str(name)
    }
}

impl FromStr for TargetFacePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single-target-face" | "single" => Ok(TargetFacePolicy::SingleTargetFace),
            "all-target-faces" | "all" => Ok(TargetFacePolicy::AllTargetFaces),
            other => Err(format!(
                "unknown target face policy '{other}', expected single-target-face or all-target-faces"
            )),
        }
    }
}
