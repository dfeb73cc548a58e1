/// How the scene image and the video image are merged.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BlendStyle {
    /// Per-channel saturating add of scene and video.
    ColorAdd,
    /// Thresholded grayscale scene added to thresholded grayscale video.
    #[default]
    GrayAdd,
    /// Grayscale video tinted red where the scene is lit.
    GrayMixRed,
}

impl BlendStyle {
    /// Every style, in menu order.
    pub const ALL: [Self; 3] = [Self::ColorAdd, Self::GrayAdd, Self::GrayMixRed];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ColorAdd => "color_add",
            Self::GrayAdd => "gray_add",
            Self::GrayMixRed => "gray_mix_red",
        }
    }
}

impl std::fmt::Display for BlendStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlendStyle {
    type Err = crate::foundation::error::ShadowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                crate::foundation::error::ShadowError::validation(format!(
                    "unknown blend style '{s}'"
                ))
            })
    }
}

/// Which eye images the stereo variant shows.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StereoStyle {
    /// Left image to the left eye, right image to the right eye.
    #[default]
    Stereo,
    /// Left image to both eyes.
    Left,
    /// Right image to both eyes.
    Right,
}

impl StereoStyle {
    /// Which eye's source feeds each output, as `(left_output, right_output)`.
    pub fn sources(self) -> (Eye, Eye) {
        match self {
            Self::Stereo => (Eye::Left, Eye::Right),
            Self::Left => (Eye::Left, Eye::Left),
            Self::Right => (Eye::Right, Eye::Right),
        }
    }
}

/// One eye of a stereo pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Eye {
    /// Left eye.
    Left,
    /// Right eye.
    Right,
}

#[cfg(test)]
#[path = "../../tests/unit/composite/blend.rs"]
mod tests;
