use std::f32::consts::FRAC_1_SQRT_2;

/// Cartesian position in the room cube, each axis in [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Project spherical speaker angles onto the unit cube. Speakers of common
/// layouts land on cube edges and corners, which the renderer's layer
/// selection depends on, so the flattening keeps hard sign branches instead
/// of a smooth normalization. X is elevation in degrees (negative is up),
/// Y is azimuth in degrees (clockwise from front).
pub fn place_in_cube(x_deg: f32, y_deg: f32) -> Vector3 {
    let x_rad = x_deg.to_radians();
    let y_rad = y_deg.to_radians();
    let mut sin_x = x_rad.sin();
    let mut cos_x = x_rad.cos();
    let mut sin_y = y_rad.sin();
    let mut cos_y = y_rad.cos();
    if sin_y.abs() > cos_y.abs() {
        sin_y = if sin_y > 0.0 { FRAC_1_SQRT_2 } else { -FRAC_1_SQRT_2 };
    } else {
        cos_y = if cos_y > 0.0 { FRAC_1_SQRT_2 } else { -FRAC_1_SQRT_2 };
    }
    sin_y /= FRAC_1_SQRT_2;
    cos_y /= FRAC_1_SQRT_2;
    if sin_x.abs() >= FRAC_1_SQRT_2 {
        sin_x = if sin_x > 0.0 { FRAC_1_SQRT_2 } else { -FRAC_1_SQRT_2 };
        cos_x /= FRAC_1_SQRT_2;
        sin_y *= cos_x;
        cos_y *= cos_x;
    }
    sin_x /= FRAC_1_SQRT_2;
    Vector3::new(sin_y, -sin_x, cos_y)
}

/// One speaker of a layout: spherical angles, LFE flag and the derived
/// position in the room cube.
#[derive(Clone, Copy, Debug)]
pub struct AudioChannel {
    x: f32,
    y: f32,
    pub lfe: bool,
    cubical_pos: Vector3,
}

impl AudioChannel {
    pub fn new(x: f32, y: f32, lfe: bool) -> Self {
        Self {
            x,
            y,
            lfe,
            cubical_pos: place_in_cube(x, y),
        }
    }

    /// Elevation in degrees, negative above the listener.
    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Azimuth in degrees, clockwise from the front.
    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn cubical_pos(&self) -> Vector3 {
        self.cubical_pos
    }

    /// Move the speaker, rederiving its cube position.
    pub fn set_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.cubical_pos = place_in_cube(x, y);
    }
}

/// Output layout presets selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpatialTarget {
    /// Keep the source layout, only copy content.
    Disabled,
    /// Resolve the layout the user configured on this machine.
    User,
    Front3_0_1,
    Front3_1_2,
    Quadro4_0_2,
    Quadro4_0_4,
    Surround5_1_2,
}

impl SpatialTarget {
    /// Numeric form used by the command line.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Disabled),
            1 => Some(Self::User),
            301 => Some(Self::Front3_0_1),
            312 => Some(Self::Front3_1_2),
            402 => Some(Self::Quadro4_0_2),
            404 => Some(Self::Quadro4_0_4),
            512 => Some(Self::Surround5_1_2),
            _ => None,
        }
    }

    /// Speakers of the preset. `Disabled` and `User` have no fixed set.
    pub fn channels(self) -> Option<Vec<AudioChannel>> {
        let set: &[(f32, f32, bool)] = match self {
            Self::Disabled | Self::User => return None,
            Self::Front3_0_1 => &[
                (0.0, -45.0, false),
                (0.0, 45.0, false),
                (0.0, 180.0, false),
                (-90.0, 0.0, false),
            ],
            Self::Front3_1_2 => &[
                (0.0, -45.0, false),
                (0.0, 45.0, false),
                (0.0, 180.0, false),
                (0.0, 0.0, true),
                (-45.0, -70.0, false),
                (-45.0, 70.0, false),
            ],
            Self::Quadro4_0_2 => &[
                (0.0, -45.0, false),
                (0.0, 45.0, false),
                (0.0, -135.0, false),
                (0.0, 135.0, false),
                (-45.0, -90.0, false),
                (-45.0, 90.0, false),
            ],
            Self::Quadro4_0_4 => &[
                (0.0, -45.0, false),
                (0.0, 45.0, false),
                (0.0, -135.0, false),
                (0.0, 135.0, false),
                (-45.0, -45.0, false),
                (-45.0, 45.0, false),
                (-45.0, -135.0, false),
                (-45.0, 135.0, false),
            ],
            Self::Surround5_1_2 => &[
                (0.0, -30.0, false),
                (0.0, 30.0, false),
                (0.0, 0.0, false),
                (0.0, 0.0, true),
                (0.0, -110.0, false),
                (0.0, 110.0, false),
                (-45.0, -70.0, false),
                (-45.0, 70.0, false),
            ],
        };
        Some(set.iter().map(|&(x, y, lfe)| AudioChannel::new(x, y, lfe)).collect())
    }
}

/// Industry standard speaker order for a given channel count, used when a
/// container carries no position metadata of its own.
pub fn default_channel_set(count: usize) -> Vec<AudioChannel> {
    let set: &[(f32, f32, bool)] = match count {
        1 => &[(0.0, 0.0, false)],
        2 => &[(0.0, -30.0, false), (0.0, 30.0, false)],
        3 => &[(0.0, -30.0, false), (0.0, 30.0, false), (0.0, 0.0, false)],
        4 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
        ],
        5 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
        ],
        6 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (0.0, 0.0, true),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
        ],
        7 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (0.0, 0.0, true),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
            (0.0, 180.0, false),
        ],
        8 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (0.0, 0.0, true),
            (0.0, -150.0, false),
            (0.0, 150.0, false),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
        ],
        9 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (0.0, 0.0, true),
            (0.0, -150.0, false),
            (0.0, 150.0, false),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
            (0.0, 180.0, false),
        ],
        10 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (0.0, 0.0, true),
            (0.0, -150.0, false),
            (0.0, 150.0, false),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
            (-45.0, -70.0, false),
            (-45.0, 70.0, false),
        ],
        11 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (0.0, 0.0, true),
            (0.0, -150.0, false),
            (0.0, 150.0, false),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
            (-45.0, -70.0, false),
            (-45.0, 70.0, false),
            (90.0, 0.0, false),
        ],
        12 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (0.0, 0.0, true),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
            (-45.0, -30.0, false),
            (-45.0, 30.0, false),
            (-45.0, 0.0, false),
            (-90.0, 0.0, false),
            (-45.0, -110.0, false),
            (-45.0, 110.0, false),
        ],
        13 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (-45.0, 0.0, false),
            (0.0, -150.0, false),
            (0.0, 150.0, false),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
            (-45.0, -30.0, false),
            (-45.0, 30.0, false),
            (-45.0, -110.0, false),
            (-45.0, 110.0, false),
            (0.0, 0.0, true),
        ],
        14 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (0.0, 0.0, true),
            (0.0, -150.0, false),
            (0.0, 150.0, false),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
            (-45.0, -30.0, false),
            (-45.0, 30.0, false),
            (-45.0, 0.0, false),
            (-90.0, 0.0, false),
            (-45.0, -110.0, false),
            (-45.0, 110.0, false),
        ],
        // 16-track cinema order. The non-positional utility tracks (HI,
        // VI-N, sync and the free slots) ride the LFE flag so the panner
        // never places content on them.
        16 => &[
            (0.0, -30.0, false),
            (0.0, 30.0, false),
            (0.0, 0.0, false),
            (0.0, 0.0, true),
            (0.0, -110.0, false),
            (0.0, 110.0, false),
            (0.0, 0.0, true),
            (0.0, 0.0, true),
            (0.0, -15.0, false),
            (0.0, 15.0, false),
            (0.0, -150.0, false),
            (0.0, 150.0, false),
            (0.0, 0.0, true),
            (0.0, 0.0, true),
            (0.0, 0.0, true),
            (0.0, 0.0, true),
        ],
        _ => return (0..count).map(|_| AudioChannel::new(0.0, 0.0, false)).collect(),
    };
    set.iter().map(|&(x, y, lfe)| AudioChannel::new(x, y, lfe)).collect()
}
