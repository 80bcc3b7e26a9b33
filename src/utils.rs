use std::ops::{Add, Mul, Sub};

/// Projection matrix uploaded once per viewport pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProjectionUniform {
    pub projection: [[f32; 4]; 4], // column-major 4x4 matrix
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

impl Mul<f32> for Size {
    type Output = Size;

    fn mul(self, rhs: f32) -> Self::Output {
        Size {
            width: self.width * rhs,
            height: self.height * rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Add for Position {
    type Output = Position;
    fn add(self, other: Position) -> Self::Output {
        Position {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl Sub for Position {
    type Output = Position;
    fn sub(self, other: Position) -> Self::Output {
        Position {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Mul<f32> for Position {
    type Output = Position;
    fn mul(self, factor: f32) -> Self::Output {
        Position {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from min/max corners, the layout clip rects arrive in.
    pub fn from_min_max(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x >= self.x
            && position.x <= self.x + self.width
            && position.y >= self.y
            && position.y <= self.y + self.height
    }

    pub fn pos(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
        }
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }
}

/// Orthographic projection mapping `display_pos .. display_pos + display_size`
/// to clip space, with y pointing down and depth in wgpu's 0..1 range.
pub fn ortho_projection(display_pos: Position, display_size: Size) -> [[f32; 4]; 4] {
    let l = display_pos.x;
    let r = display_pos.x + display_size.width;
    let t = display_pos.y;
    let b = display_pos.y + display_size.height;
    [
        [2.0 / (r - l), 0.0, 0.0, 0.0],
        [0.0, 2.0 / (t - b), 0.0, 0.0],
        [0.0, 0.0, 0.5, 0.0],
        [(r + l) / (l - r), (t + b) / (b - t), 0.5, 1.0],
    ]
}

/// Applies a column-major matrix to a 2D point, returning clip-space x/y.
pub fn project_point(projection: &[[f32; 4]; 4], point: Position) -> Position {
    Position {
        x: projection[0][0] * point.x + projection[1][0] * point.y + projection[3][0],
        y: projection[0][1] * point.x + projection[1][1] * point.y + projection[3][1],
    }
}
