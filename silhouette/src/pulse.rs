use silhouette_types::{ColorGroup, OutlineConfig};

/// Animates the alpha of line color A back and forth between 0 and 1.
///
/// Alpha moves by the frame's delta time, so one sweep takes one second.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct OutlinePulse {
    rising: bool,
}

impl OutlinePulse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rising(&self) -> bool {
        self.rising
    }

    /// Advance by `delta_seconds`. The caller re-applies the config afterwards.
    pub fn update(&mut self, config: &mut OutlineConfig, delta_seconds: f32) {
        let mut color = config.line_color(ColorGroup::A);

        if self.rising {
            color.w += delta_seconds;
            if color.w >= 1.0 {
                self.rising = false;
            }
        } else {
            color.w -= delta_seconds;
            if color.w <= 0.0 {
                self.rising = true;
            }
        }

        color.w = color.w.clamp(0.0, 1.0);
        config.set_line_color(ColorGroup::A, color);
    }
}
