/// Retained draw list handed to the renderer each frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Actor {
    Sprite {
        align: [f32; 2],
        offset: [f32; 2],
        size: [f32; 2],
        /// Texture key, resolved by the renderer.
        texture: String,
        /// RGBA; alpha carries fades.
        tint: [f32; 4],
        /// Gaussian blur sigma per axis, in screen pixels.
        blur: [f32; 2],
        z: i16,
        visible: bool,
    },

    /// Group box. `tint` multiplies into every child.
    Frame {
        align: [f32; 2],
        offset: [f32; 2],
        size: [f32; 2],
        children: Vec<Self>,
        tint: [f32; 4],
        z: i16,
        visible: bool,
    },
}

impl Actor {
    #[inline(always)]
    pub const fn z(&self) -> i16 {
        match self {
            Self::Sprite { z, .. } | Self::Frame { z, .. } => *z,
        }
    }

    #[inline(always)]
    pub const fn is_visible(&self) -> bool {
        match self {
            Self::Sprite { visible, .. } | Self::Frame { visible, .. } => *visible,
        }
    }

    /// Visits this actor and all descendants depth-first.
    pub fn walk<F: FnMut(&Self)>(&self, f: &mut F) {
        f(self);
        if let Self::Frame { children, .. } = self {
            for child in children {
                child.walk(f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Actor;

    fn sprite(z: i16) -> Actor {
        Actor::Sprite {
            align: [0.5, 0.5],
            offset: [0.0, 0.0],
            size: [1.0, 1.0],
            texture: format!("t{z}"),
            tint: [1.0; 4],
            blur: [0.0; 2],
            z,
            visible: true,
        }
    }

    #[test]
    fn walk_visits_frame_then_children_in_order() {
        let frame = Actor::Frame {
            align: [0.0, 0.0],
            offset: [0.0, 0.0],
            size: [10.0, 10.0],
            children: vec![sprite(-2), sprite(-1)],
            tint: [1.0; 4],
            z: -100,
            visible: true,
        };
        let mut zs = Vec::new();
        frame.walk(&mut |a| zs.push(a.z()));
        assert_eq!(zs, vec![-100, -2, -1]);
    }
}
