use std::collections::BTreeSet;
use std::fmt;

use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{CeilingError, Result};
use crate::report::{mean, median, nan_median, std_dev};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Int(i64),
    Str(String),
}

impl Label {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Label::Int(v) => Some(*v),
            Label::Str(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(v) => write!(f, "{v}"),
            Label::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Label::Str(value.to_string())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Label::Str(value)
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Label::Int(value)
    }
}

impl From<usize> for Label {
    fn from(value: usize) -> Self {
        Label::Int(value as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub values: Vec<Label>,
}

impl Coord {
    pub fn new(name: impl Into<String>, values: Vec<Label>) -> Self {
        Self {
            name: name.into(),
            level: None,
            values,
        }
    }

    fn key(&self) -> (&str, Option<&str>) {
        (self.name.as_str(), self.level.as_deref())
    }

    fn select(&self, indices: &[usize]) -> Coord {
        Coord {
            name: self.name.clone(),
            level: self.level.clone(),
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dim {
    pub name: String,
    #[serde(default)]
    pub coords: Vec<Coord>,
}

impl Dim {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coords: Vec::new(),
        }
    }

    pub fn indexed(name: impl Into<String>, values: Vec<Label>) -> Self {
        let name = name.into();
        Self {
            coords: vec![Coord::new(name.clone(), values)],
            name,
        }
    }

    pub fn with_coord(mut self, name: impl Into<String>, values: Vec<Label>) -> Self {
        self.coords.push(Coord::new(name, values));
        self
    }

    fn keys(&self) -> Vec<(&str, Option<&str>)> {
        self.coords.iter().map(Coord::key).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Median,
    Std,
    NanMedian,
}

impl Reduction {
    fn apply(self, values: &[f64]) -> f64 {
        match self {
            Reduction::Mean => mean(values),
            Reduction::Median => median(values),
            Reduction::Std => std_dev(values),
            Reduction::NanMedian => nan_median(values),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "TensorRepr", try_from = "TensorRepr")]
pub struct LabeledTensor {
    dims: Vec<Dim>,
    data: ArrayD<f64>,
}

impl LabeledTensor {
    pub fn new(dims: Vec<Dim>, data: ArrayD<f64>) -> Result<Self> {
        if dims.len() != data.ndim() {
            return Err(CeilingError::StructuralMismatch(format!(
                "{} dims declared for a {}-d buffer",
                dims.len(),
                data.ndim()
            )));
        }
        let mut seen = BTreeSet::new();
        for (i, dim) in dims.iter().enumerate() {
            if !seen.insert(dim.name.as_str()) {
                return Err(CeilingError::StructuralMismatch(format!(
                    "duplicate dim `{}`",
                    dim.name
                )));
            }
            let len = data.len_of(Axis(i));
            for coord in &dim.coords {
                if coord.values.len() != len {
                    return Err(CeilingError::StructuralMismatch(format!(
                        "coordinate `{}` has {} values for dim `{}` of size {}",
                        coord.name,
                        coord.values.len(),
                        dim.name,
                        len
                    )));
                }
            }
        }
        Ok(Self { dims, data })
    }

    pub fn from_shape_vec(dims: Vec<Dim>, shape: &[usize], values: Vec<f64>) -> Result<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|e| CeilingError::StructuralMismatch(e.to_string()))?;
        Self::new(dims, data)
    }

    pub fn vector(dim: Dim, values: Vec<f64>) -> Result<Self> {
        let n = values.len();
        Self::from_shape_vec(vec![dim], &[n], values)
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            dims: Vec::new(),
            data: ArrayD::from_elem(IxDyn(&[]), value),
        }
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn dim_names(&self) -> Vec<&str> {
        self.dims.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    pub fn item(&self) -> Result<f64> {
        if self.data.len() != 1 {
            return Err(CeilingError::StructuralMismatch(format!(
                "expected a single value, found {}",
                self.data.len()
            )));
        }
        Ok(self.data.iter().copied().next().unwrap_or(f64::NAN))
    }

    pub fn has_dim(&self, name: &str) -> bool {
        self.dims.iter().any(|d| d.name == name)
    }

    pub fn has_level(&self, name: &str) -> bool {
        self.has_dim(name)
            || self
                .dims
                .iter()
                .flat_map(|d| d.coords.iter())
                .any(|c| c.level.as_deref() == Some(name))
    }

    pub fn axis_index(&self, name: &str) -> Result<usize> {
        self.dims
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| CeilingError::MissingStructuralKey(name.to_string()))
    }

    pub fn len_of(&self, name: &str) -> Result<usize> {
        Ok(self.data.len_of(Axis(self.axis_index(name)?)))
    }

    pub fn coord(&self, name: &str) -> Result<(usize, &Coord)> {
        for (i, dim) in self.dims.iter().enumerate() {
            if let Some(coord) = dim.coords.iter().find(|c| c.name == name) {
                return Ok((i, coord));
            }
        }
        Err(CeilingError::MissingStructuralKey(name.to_string()))
    }

    pub fn coord_values(&self, name: &str) -> Result<&[Label]> {
        Ok(&self.coord(name)?.1.values)
    }

    pub fn walk_coords(&self) -> impl Iterator<Item = (&str, &str, &[Label])> + '_ {
        self.dims.iter().flat_map(|dim| {
            dim.coords
                .iter()
                .map(move |c| (c.name.as_str(), dim.name.as_str(), c.values.as_slice()))
        })
    }

    pub fn isel(&self, dim: &str, indices: &[usize]) -> Result<Self> {
        let axis = self.axis_index(dim)?;
        let len = self.data.len_of(Axis(axis));
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(CeilingError::StructuralMismatch(format!(
                "index {bad} out of bounds for dim `{dim}` of size {len}"
            )));
        }
        let data = self.data.select(Axis(axis), indices);
        let mut dims = self.dims.clone();
        dims[axis].coords = self.dims[axis]
            .coords
            .iter()
            .map(|c| c.select(indices))
            .collect();
        Ok(Self { dims, data })
    }

    pub fn filter(&self, dim: &str, mask: &[bool]) -> Result<Self> {
        let len = self.len_of(dim)?;
        if mask.len() != len {
            return Err(CeilingError::StructuralMismatch(format!(
                "mask of length {} for dim `{dim}` of size {len}",
                mask.len()
            )));
        }
        let indices = mask
            .iter()
            .enumerate()
            .filter(|(_, keep)| **keep)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        self.isel(dim, &indices)
    }

    pub fn index_axis(&self, dim: &str, index: usize) -> Result<Self> {
        let axis = self.axis_index(dim)?;
        let len = self.data.len_of(Axis(axis));
        if index >= len {
            return Err(CeilingError::StructuralMismatch(format!(
                "index {index} out of bounds for dim `{dim}` of size {len}"
            )));
        }
        let data = self.data.index_axis(Axis(axis), index).to_owned();
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(Self { dims, data })
    }

    pub fn sel(&self, coord: &str, label: &Label) -> Result<Self> {
        let (axis, c) = self.coord(coord)?;
        let idx = position_of(c, label)?;
        let data = self.data.index_axis(Axis(axis), idx).to_owned();
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(Self { dims, data })
    }

    pub fn assign_sel(&mut self, coord: &str, label: &Label, other: &LabeledTensor) -> Result<()> {
        let (axis, c) = self.coord(coord)?;
        let idx = position_of(c, label)?;
        let remaining = self
            .dims
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != axis)
            .map(|(_, d)| d.name.as_str())
            .collect::<Vec<_>>();
        if remaining != other.dim_names() {
            return Err(CeilingError::StructuralMismatch(format!(
                "cannot assign dims {:?} into slab with dims {:?}",
                other.dim_names(),
                remaining
            )));
        }
        let mut slab = self.data.index_axis_mut(Axis(axis), idx);
        if slab.shape() != other.data.shape() {
            return Err(CeilingError::StructuralMismatch(format!(
                "cannot assign shape {:?} into slab of shape {:?}",
                other.data.shape(),
                slab.shape()
            )));
        }
        slab.assign(&other.data);
        Ok(())
    }

    pub fn expand_dims(self, name: &str, coords: Vec<(String, Label)>) -> Result<Self> {
        if self.has_dim(name) {
            return Err(CeilingError::StructuralMismatch(format!(
                "dim `{name}` already present"
            )));
        }
        let dim = Dim {
            name: name.to_string(),
            coords: coords
                .into_iter()
                .map(|(coord, label)| Coord::new(coord, vec![label]))
                .collect(),
        };
        let mut dims = Vec::with_capacity(self.dims.len() + 1);
        dims.push(dim);
        dims.extend(self.dims);
        Ok(Self {
            dims,
            data: self.data.insert_axis(Axis(0)),
        })
    }

    pub fn reduce(&self, dim: &str, how: Reduction) -> Result<Self> {
        let axis = self.axis_index(dim)?;
        let data = self.data.map_axis(Axis(axis), |lane| {
            let values = lane.iter().copied().collect::<Vec<_>>();
            how.apply(&values)
        });
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(Self { dims, data })
    }

    pub fn stack(&self, new_dim: &str) -> Self {
        let shape = self.data.shape().to_vec();
        let total = shape.iter().product::<usize>();
        let mut coords = Vec::new();
        for (axis, dim) in self.dims.iter().enumerate() {
            let stride = shape[axis + 1..].iter().product::<usize>();
            let len = shape[axis];
            for coord in &dim.coords {
                let values = (0..total)
                    .map(|flat| coord.values[(flat / stride) % len].clone())
                    .collect();
                coords.push(Coord {
                    name: coord.name.clone(),
                    level: coord.level.clone().or_else(|| Some(dim.name.clone())),
                    values,
                });
            }
        }
        let data = ArrayD::from_shape_vec(IxDyn(&[total]), self.data.iter().copied().collect())
            .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0])));
        Self {
            dims: vec![Dim {
                name: new_dim.to_string(),
                coords,
            }],
            data,
        }
    }

    pub fn level_coords(&self, level: &str) -> Vec<&Coord> {
        self.dims
            .iter()
            .flat_map(|d| {
                d.coords.iter().filter(move |c| match &c.level {
                    Some(l) => l == level,
                    None => d.name == level,
                })
            })
            .collect()
    }
}

fn position_of(coord: &Coord, label: &Label) -> Result<usize> {
    let mut hits = coord
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| *v == label)
        .map(|(i, _)| i);
    match (hits.next(), hits.next()) {
        (Some(idx), None) => Ok(idx),
        (None, _) => Err(CeilingError::MissingStructuralKey(format!(
            "{}={}",
            coord.name, label
        ))),
        (Some(_), Some(_)) => Err(CeilingError::StructuralMismatch(format!(
            "{}={} is not unique",
            coord.name, label
        ))),
    }
}

pub fn unique_sorted(values: &[Label]) -> Vec<Label> {
    values
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn merge(elements: &[LabeledTensor], on: &str) -> Result<LabeledTensor> {
    let first = elements
        .first()
        .ok_or_else(|| CeilingError::EmptyMerge(on.to_string()))?;
    let axis = first.axis_index(on)?;
    let names = first.dim_names();
    for element in &elements[1..] {
        if element.dim_names() != names {
            return Err(CeilingError::StructuralMismatch(format!(
                "dims {:?} do not match {:?}",
                element.dim_names(),
                names
            )));
        }
        for (i, (a, b)) in first.dims.iter().zip(&element.dims).enumerate() {
            if i == axis {
                if a.keys() != b.keys() {
                    return Err(CeilingError::StructuralMismatch(format!(
                        "coordinate keys along `{on}` differ: {:?} vs {:?}",
                        a.keys(),
                        b.keys()
                    )));
                }
            } else if a.coords != b.coords
                || first.data.len_of(Axis(i)) != element.data.len_of(Axis(i))
            {
                return Err(CeilingError::StructuralMismatch(format!(
                    "coordinates along `{}` differ between merge elements",
                    a.name
                )));
            }
        }
    }

    let views = elements.iter().map(|e| e.data.view()).collect::<Vec<_>>();
    let data = ndarray::concatenate(Axis(axis), &views)
        .map_err(|e| CeilingError::StructuralMismatch(e.to_string()))?;

    let mut dims = first.dims.clone();
    for (c, coord) in dims[axis].coords.iter_mut().enumerate() {
        coord.values = elements
            .iter()
            .flat_map(|e| e.dims[axis].coords[c].values.iter().cloned())
            .collect();
    }
    LabeledTensor::new(dims, data)
}

#[derive(Serialize, Deserialize)]
struct TensorRepr {
    dims: Vec<Dim>,
    shape: Vec<usize>,
    data: Vec<Option<f64>>,
}

impl From<LabeledTensor> for TensorRepr {
    fn from(value: LabeledTensor) -> Self {
        TensorRepr {
            shape: value.data.shape().to_vec(),
            data: value
                .data
                .iter()
                .map(|v| if v.is_finite() { Some(*v) } else { None })
                .collect(),
            dims: value.dims,
        }
    }
}

impl TryFrom<TensorRepr> for LabeledTensor {
    type Error = CeilingError;

    fn try_from(value: TensorRepr) -> Result<Self> {
        let values = value
            .data
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        LabeledTensor::from_shape_vec(value.dims, &value.shape, values)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/labeled.rs"]
mod tests;
