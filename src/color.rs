use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ErrorKind};

/// An RGB color with each channel in the range 0 to 1, which is what the PDF `RG` operator expects.
///
/// Colors travel as hex strings (`#RRGGBB`) in every serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    red: f32,
    green: f32,
    blue: f32,
}

impl Color {
    /// The ink color used when nothing else has been configured.
    pub const RED: Color = Color {
        red: 1.0,
        green: 0.0,
        blue: 0.0,
    };

    /// Builds a color from channels in the range 0 to 1, clamping anything outside of it.
    pub fn from_components(red: f32, green: f32, blue: f32) -> Self {
        Color {
            red: clamp_channel(red),
            green: clamp_channel(green),
            blue: clamp_channel(blue),
        }
    }

    /// Parses `#RRGGBB`, `RRGGBB` or the shorthand `#RGB`, case insensitive.
    pub fn from_hex(hex: &str) -> Result<Self, ContextError> {
        let trimmed = hex.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let invalid = || {
            ContextError::with_context(
                ErrorKind::InvalidInput,
                format!("Invalid hex color {:?}", hex),
            )
        };
        // `from_str_radix` would also take a sign
        if !digits.chars().all(|character| character.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channels = match digits.len() {
            6 => [&digits[0..2], &digits[2..4], &digits[4..6]]
                .iter()
                .map(|channel| u8::from_str_radix(channel, 16))
                .collect::<Result<Vec<u8>, _>>(),
            3 => digits
                .chars()
                .map(|channel| u8::from_str_radix(&format!("{channel}{channel}"), 16))
                .collect::<Result<Vec<u8>, _>>(),
            _ => return Err(invalid()),
        }
        .map_err(|error| {
            ContextError::with_error(
                ErrorKind::InvalidInput,
                format!("Invalid hex color {:?}", hex),
                &error,
            )
        })?;

        match channels[..] {
            [red, green, blue] => Ok(Color {
                red: red as f32 / 255.0,
                green: green as f32 / 255.0,
                blue: blue as f32 / 255.0,
            }),
            _ => Err(invalid()),
        }
    }

    pub fn red(&self) -> f32 {
        self.red
    }

    pub fn green(&self) -> f32 {
        self.green
    }

    pub fn blue(&self) -> f32 {
        self.blue
    }

    /// The channels as an `[r, g, b]` array.
    pub fn to_array(&self) -> [f32; 3] {
        [self.red, self.green, self.blue]
    }

    /// Renders the color back as `#RRGGBB` in uppercase.
    pub fn to_hex(&self) -> String {
        let [red, green, blue] = self.to_array().map(|channel| (channel * 255.0).round() as u8);
        format!("#{red:02X}{green:02X}{blue:02X}")
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::RED
    }
}

impl TryFrom<String> for Color {
    type Error = ContextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_hex()
    }
}

impl std::str::FromStr for Color {
    type Err = ContextError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        Color::from_hex(string)
    }
}

fn clamp_channel(channel: f32) -> f32 {
    if channel.is_finite() {
        channel.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
