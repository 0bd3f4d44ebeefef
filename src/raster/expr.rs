//! Lazy raster expressions.
//!
//! A `RasterExpr` only describes a computation; nothing is read or computed
//! until a [`RasterEngine`](crate::engine::RasterEngine) evaluates it at a
//! reduction or `compute` call. Expressions are immutable and cheap to clone
//! (nodes are reference counted), so shared sub-graphs keep their identity
//! and an engine can evaluate each of them once per request.
//!
//! Errors such as unknown band names or mismatched band counts are only
//! detected at evaluation time.
use std::sync::Arc;

use crate::core::speckle::SpeckleFilterParams;
use crate::raster::{ImageCollection, Region};
use crate::types::Connectivity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    And,
    Or,
}

impl BinaryOp {
    /// Apply to two valid pixel values. `None` means the output pixel is masked.
    pub fn apply(&self, a: f64, b: f64) -> Option<f64> {
        let flag = |c: bool| if c { 1.0 } else { 0.0 };
        match self {
            BinaryOp::Add => Some(a + b),
            BinaryOp::Subtract => Some(a - b),
            BinaryOp::Multiply => Some(a * b),
            BinaryOp::Divide => {
                let q = a / b;
                (b != 0.0 && q.is_finite()).then_some(q)
            }
            BinaryOp::Gt => Some(flag(a > b)),
            BinaryOp::Gte => Some(flag(a >= b)),
            BinaryOp::Lt => Some(flag(a < b)),
            BinaryOp::Lte => Some(flag(a <= b)),
            BinaryOp::Eq => Some(flag(a == b)),
            BinaryOp::Neq => Some(flag(a != b)),
            BinaryOp::And => Some(flag(a != 0.0 && b != 0.0)),
            BinaryOp::Or => Some(flag(a != 0.0 || b != 0.0)),
        }
    }
}

/// Expression graph node.
#[derive(Debug)]
pub enum Node {
    /// Single catalog image by id
    Image(String),
    /// Mosaic of a filtered collection
    Mosaic(ImageCollection),
    /// Constant single-band image named `constant`
    Constant(f64),
    /// Per-pixel area in square metres, band `area`
    PixelArea,
    Select(RasterExpr, Vec<String>),
    Rename(RasterExpr, Vec<String>),
    AddBands(RasterExpr, RasterExpr),
    Binary(BinaryOp, RasterExpr, RasterExpr),
    /// Replace values with `value` where `condition` is valid and non-zero
    Where {
        input: RasterExpr,
        condition: RasterExpr,
        value: RasterExpr,
    },
    /// Mask pixels whose value is zero
    SelfMask(RasterExpr),
    /// Mask pixels where the mask image is zero or masked
    UpdateMask(RasterExpr, RasterExpr),
    Clip(RasterExpr, Region),
    SpeckleFilter(RasterExpr, SpeckleFilterParams),
    /// Slope in degrees of a single-band elevation image, band `slope`
    TerrainSlope(RasterExpr),
    ConnectedPixelCount {
        input: RasterExpr,
        max_size: usize,
        connectivity: Connectivity,
    },
}

#[derive(Debug, Clone)]
pub struct RasterExpr(Arc<Node>);

impl RasterExpr {
    fn wrap(node: Node) -> Self {
        Self(Arc::new(node))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    /// Identity of this node; clones share it.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn image(id: impl Into<String>) -> Self {
        Self::wrap(Node::Image(id.into()))
    }

    pub fn mosaic(collection: ImageCollection) -> Self {
        Self::wrap(Node::Mosaic(collection))
    }

    pub fn constant(value: f64) -> Self {
        Self::wrap(Node::Constant(value))
    }

    pub fn pixel_area() -> Self {
        Self::wrap(Node::PixelArea)
    }

    pub fn select(&self, bands: &[&str]) -> Self {
        Self::wrap(Node::Select(
            self.clone(),
            bands.iter().map(|b| b.to_string()).collect(),
        ))
    }

    pub fn rename(&self, names: &[&str]) -> Self {
        Self::wrap(Node::Rename(
            self.clone(),
            names.iter().map(|b| b.to_string()).collect(),
        ))
    }

    pub fn add_bands(&self, other: &RasterExpr) -> Self {
        Self::wrap(Node::AddBands(self.clone(), other.clone()))
    }

    fn binary(&self, op: BinaryOp, other: &RasterExpr) -> Self {
        Self::wrap(Node::Binary(op, self.clone(), other.clone()))
    }

    pub fn add(&self, other: &RasterExpr) -> Self {
        self.binary(BinaryOp::Add, other)
    }

    pub fn subtract(&self, other: &RasterExpr) -> Self {
        self.binary(BinaryOp::Subtract, other)
    }

    pub fn multiply(&self, other: &RasterExpr) -> Self {
        self.binary(BinaryOp::Multiply, other)
    }

    pub fn divide(&self, other: &RasterExpr) -> Self {
        self.binary(BinaryOp::Divide, other)
    }

    pub fn gt(&self, value: f64) -> Self {
        self.binary(BinaryOp::Gt, &Self::constant(value))
    }

    pub fn gte(&self, value: f64) -> Self {
        self.binary(BinaryOp::Gte, &Self::constant(value))
    }

    pub fn lt(&self, value: f64) -> Self {
        self.binary(BinaryOp::Lt, &Self::constant(value))
    }

    pub fn lte(&self, value: f64) -> Self {
        self.binary(BinaryOp::Lte, &Self::constant(value))
    }

    pub fn eq(&self, value: f64) -> Self {
        self.binary(BinaryOp::Eq, &Self::constant(value))
    }

    pub fn neq(&self, value: f64) -> Self {
        self.binary(BinaryOp::Neq, &Self::constant(value))
    }

    pub fn and(&self, other: &RasterExpr) -> Self {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(&self, other: &RasterExpr) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    pub fn where_(&self, condition: &RasterExpr, value: f64) -> Self {
        Self::wrap(Node::Where {
            input: self.clone(),
            condition: condition.clone(),
            value: Self::constant(value),
        })
    }

    pub fn self_mask(&self) -> Self {
        Self::wrap(Node::SelfMask(self.clone()))
    }

    pub fn update_mask(&self, mask: &RasterExpr) -> Self {
        Self::wrap(Node::UpdateMask(self.clone(), mask.clone()))
    }

    pub fn clip(&self, region: &Region) -> Self {
        Self::wrap(Node::Clip(self.clone(), region.clone()))
    }

    pub fn speckle_filter(&self, params: SpeckleFilterParams) -> Self {
        Self::wrap(Node::SpeckleFilter(self.clone(), params))
    }

    pub fn terrain_slope(&self) -> Self {
        Self::wrap(Node::TerrainSlope(self.clone()))
    }

    pub fn connected_pixel_count(&self, max_size: usize, connectivity: Connectivity) -> Self {
        Self::wrap(Node::ConnectedPixelCount {
            input: self.clone(),
            max_size,
            connectivity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let a = RasterExpr::image("dem");
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), RasterExpr::image("dem").id());
    }

    #[test]
    fn comparisons_are_strict_where_asked() {
        let t = 1.05_f64;
        assert_eq!(BinaryOp::Gt.apply(t, t), Some(0.0));
        assert_eq!(BinaryOp::Gt.apply(one_ulp_above(t), t), Some(1.0));
        assert_eq!(BinaryOp::Gte.apply(t, t), Some(1.0));
    }

    #[test]
    fn division_by_zero_masks() {
        assert_eq!(BinaryOp::Divide.apply(1.0, 0.0), None);
        assert_eq!(BinaryOp::Divide.apply(0.0, 0.0), None);
        assert_eq!(BinaryOp::Divide.apply(3.0, 2.0), Some(1.5));
    }

    fn one_ulp_above(x: f64) -> f64 {
        f64::from_bits(x.to_bits() + 1)
    }
}
