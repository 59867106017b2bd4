use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use layoutgen_core::document::{
    Circle, Document, Entity, EntityId, EntitySpace, EntityStyle, Line, Polyline, Text, TextAlign,
};
use layoutgen_core::geometry::{Point2, Point3};

use crate::coordinates::coerce_number;
use crate::errors::{EntityError, ValidationError};
use crate::validation::{validate_angle, validate_point, validate_radius, MAX_ANGLE, MIN_ANGLE};

/// 未声明图层时使用的保留图层。
pub const DEFAULT_LAYER: &str = "default";
pub const DEFAULT_TEXT_HEIGHT: f64 = 2.5;

/// 19 种实体类型标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Rectangle,
    Circle,
    Line,
    Text,
    Arc,
    Spline,
    Polyline,
    Ellipse,
    Solid,
    Mesh,
    Dimension,
    Leader,
    Hatch,
    MText,
    Viewport,
    Linetype,
    LayerState,
    Attribute,
    CoordinateSystem,
}

impl EntityKind {
    pub const ALL: [EntityKind; 19] = [
        EntityKind::Rectangle,
        EntityKind::Circle,
        EntityKind::Line,
        EntityKind::Text,
        EntityKind::Arc,
        EntityKind::Spline,
        EntityKind::Polyline,
        EntityKind::Ellipse,
        EntityKind::Solid,
        EntityKind::Mesh,
        EntityKind::Dimension,
        EntityKind::Leader,
        EntityKind::Hatch,
        EntityKind::MText,
        EntityKind::Viewport,
        EntityKind::Linetype,
        EntityKind::LayerState,
        EntityKind::Attribute,
        EntityKind::CoordinateSystem,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Rectangle => "rectangle",
            EntityKind::Circle => "circle",
            EntityKind::Line => "line",
            EntityKind::Text => "text",
            EntityKind::Arc => "arc",
            EntityKind::Spline => "spline",
            EntityKind::Polyline => "polyline",
            EntityKind::Ellipse => "ellipse",
            EntityKind::Solid => "solid",
            EntityKind::Mesh => "mesh",
            EntityKind::Dimension => "dimension",
            EntityKind::Leader => "leader",
            EntityKind::Hatch => "hatch",
            EntityKind::MText => "mtext",
            EntityKind::Viewport => "viewport",
            EntityKind::Linetype => "linetype",
            EntityKind::LayerState => "layer_state",
            EntityKind::Attribute => "attribute",
            EntityKind::CoordinateSystem => "coordinate_system",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条松散类型的实体指令，保留原始 JSON，按字段名取值并逐项校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityData(Value);

impl EntityData {
    #[inline]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[inline]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[inline]
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    pub fn kind_tag(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// 去除首尾空白后的图层名；空串视为未指定。
    pub fn layer(&self) -> Option<&str> {
        self.0
            .get("layer")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|layer| !layer.is_empty())
    }

    pub fn layer_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.layer().unwrap_or(fallback)
    }

    /// 字段存在且不为 null。
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|value| !value.is_null())
    }

    #[inline]
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn require(&self, field: &'static str) -> Result<&Value, EntityError> {
        self.get(field).ok_or(EntityError::MissingField(field))
    }

    pub fn point(&self, field: &'static str) -> Result<Point2, EntityError> {
        point2_from(self.require(field)?, field)
    }

    pub fn optional_point(&self, field: &'static str) -> Result<Option<Point2>, EntityError> {
        self.get(field).map(|value| point2_from(value, field)).transpose()
    }

    /// 三维点，缺省 Z 为 0。
    pub fn point3(&self, field: &'static str) -> Result<Point3, EntityError> {
        point3_from(self.require(field)?, field)
    }

    /// 点列表，至少 `min_items` 个二维点。
    pub fn points(&self, field: &'static str, min_items: usize) -> Result<Vec<Point2>, EntityError> {
        self.list(field, min_items)?
            .iter()
            .map(|value| point2_from(value, field))
            .collect()
    }

    pub fn points3(&self, field: &'static str, min_items: usize) -> Result<Vec<Point3>, EntityError> {
        self.list(field, min_items)?
            .iter()
            .map(|value| point3_from(value, field))
            .collect()
    }

    pub fn list(&self, field: &'static str, min_items: usize) -> Result<&Vec<Value>, EntityError> {
        let value = self.require(field)?;
        let items = value
            .as_array()
            .ok_or_else(|| EntityError::invalid(field, ValidationError::NotASequence(value.clone())))?;
        if items.len() < min_items {
            return Err(EntityError::TooFewItems {
                field,
                min: min_items,
                found: items.len(),
            });
        }
        Ok(items)
    }

    pub fn radius(&self, field: &'static str) -> Result<f64, EntityError> {
        validate_radius(self.require(field)?).map_err(|err| EntityError::invalid(field, err))
    }

    /// 可选正数，缺省时取默认值。
    pub fn positive_or(&self, field: &'static str, default: f64) -> Result<f64, EntityError> {
        match self.get(field) {
            Some(value) => validate_radius(value).map_err(|err| EntityError::invalid(field, err)),
            None => Ok(default),
        }
    }

    /// 角度（度），范围 [-360, 360]。
    pub fn angle(&self, field: &'static str) -> Result<f64, EntityError> {
        validate_angle(self.require(field)?, MIN_ANGLE, MAX_ANGLE)
            .map_err(|err| EntityError::invalid(field, err))
    }

    pub fn angle_or(&self, field: &'static str, default: f64) -> Result<f64, EntityError> {
        if self.has(field) {
            self.angle(field)
        } else {
            Ok(default)
        }
    }

    pub fn number(&self, field: &'static str) -> Result<f64, EntityError> {
        let value = self.require(field)?;
        coerce_number(value)
            .ok_or_else(|| EntityError::invalid(field, ValidationError::NonNumeric(value.clone())))
    }

    pub fn number_or(&self, field: &'static str, default: f64) -> Result<f64, EntityError> {
        if self.has(field) {
            self.number(field)
        } else {
            Ok(default)
        }
    }

    /// 文本内容：字符串原样返回，数字转为字符串，空串视为缺失。
    pub fn text(&self, field: &'static str) -> Result<String, EntityError> {
        match self.require(field)? {
            Value::String(text) if text.is_empty() => Err(EntityError::MissingField(field)),
            Value::String(text) => Ok(text.clone()),
            Value::Number(number) => Ok(number.to_string()),
            other => Err(EntityError::invalid(
                field,
                ValidationError::NonNumeric(other.clone()),
            )),
        }
    }

    pub fn optional_text(&self, field: &'static str) -> Result<Option<String>, EntityError> {
        if self.has(field) {
            self.text(field).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn string_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str {
        self.get(field).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn bool_or(&self, field: &str, default: bool) -> bool {
        self.get(field).and_then(Value::as_bool).unwrap_or(default)
    }

    /// 网格顶点数，供请求校验使用。
    pub fn mesh_vertex_count(&self) -> Option<usize> {
        if self.kind_tag() != Some(EntityKind::Mesh.as_str()) {
            return None;
        }
        self.get("vertices").and_then(Value::as_array).map(Vec::len)
    }
}

impl From<Value> for EntityData {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

fn point2_from(value: &Value, field: &'static str) -> Result<Point2, EntityError> {
    let coords = validate_point(value, 2).map_err(|err| EntityError::invalid(field, err))?;
    Ok(Point2::new(coords[0], coords[1]))
}

fn point3_from(value: &Value, field: &'static str) -> Result<Point3, EntityError> {
    let coords = validate_point(value, 2).map_err(|err| EntityError::invalid(field, err))?;
    Ok(Point3::new(
        coords[0],
        coords[1],
        coords.get(2).copied().unwrap_or(0.0),
    ))
}

/// 所有实体共享的属性：图层、颜色、名称。
#[derive(Debug, Clone, PartialEq)]
pub struct SharedAttributes {
    pub layer: String,
    pub color: Option<i16>,
    pub name: Option<String>,
}

impl SharedAttributes {
    pub fn on_layer(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            color: None,
            name: None,
        }
    }

    /// 从实体指令提取共享属性，缺省图层落到 `fallback_layer`。
    pub fn from_entity(data: &EntityData, fallback_layer: &str) -> Result<Self, EntityError> {
        let layer = plain_name("layer", data.layer_or(fallback_layer))?;
        let color = match data.get("color") {
            Some(value) => Some(color_code(value)?),
            None => None,
        };
        let name = data.get("name").and_then(Value::as_str).map(str::to_string);
        Ok(Self { layer, color, name })
    }

    pub fn style(&self) -> EntityStyle {
        EntityStyle {
            layer: self.layer.clone(),
            color: self.color,
            linetype: None,
        }
    }
}

/// 图层、块、线型等表名不得含控制字符，否则会破坏 DXF 组码行。
pub fn is_plain_name(name: &str) -> bool {
    !name.chars().any(char::is_control)
}

pub fn plain_name(field: &'static str, name: &str) -> Result<String, EntityError> {
    if is_plain_name(name) {
        Ok(name.to_string())
    } else {
        Err(EntityError::InvalidName {
            field,
            value: name.to_string(),
        })
    }
}

/// ACI 颜色号，0..=256（0 随块，256 随层）。
pub fn color_code(value: &Value) -> Result<i16, EntityError> {
    let number = coerce_number(value)
        .ok_or_else(|| EntityError::invalid("color", ValidationError::NonNumeric(value.clone())))?;
    if number.fract() != 0.0 || !(0.0..=256.0).contains(&number) {
        return Err(EntityError::InvalidGeometry(format!(
            "color {number} is not an ACI index in 0..=256"
        )));
    }
    Ok(number as i16)
}

/// 处理器写入的目标：模型空间或某个块，暴露基础绘图原语。
pub struct DrawingTarget<'a> {
    document: &'a mut Document,
    space: EntitySpace,
}

impl<'a> DrawingTarget<'a> {
    pub fn model(document: &'a mut Document) -> Self {
        Self {
            document,
            space: EntitySpace::Model,
        }
    }

    pub fn block(document: &'a mut Document, name: impl Into<String>) -> Self {
        Self {
            document,
            space: EntitySpace::Block(name.into()),
        }
    }

    #[inline]
    pub fn space(&self) -> &EntitySpace {
        &self.space
    }

    #[inline]
    pub fn document(&self) -> &Document {
        &*self.document
    }

    /// 文档级状态（线型、图层状态、UCS）需要直接修改文档。
    #[inline]
    pub fn document_mut(&mut self) -> &mut Document {
        &mut *self.document
    }

    /// 当前空间的实体数加上文档级状态记录数。
    pub fn drawable_count(&self) -> usize {
        self.document.space_entity_count(&self.space) + self.document.state_record_count()
    }

    pub fn add(&mut self, entity: Entity) -> EntityId {
        self.document.insert(&self.space, entity)
    }

    pub fn add_line(&mut self, start: Point2, end: Point2, attrs: &SharedAttributes) -> EntityId {
        self.add(Entity::Line(Line {
            start,
            end,
            style: attrs.style(),
        }))
    }

    pub fn add_circle(&mut self, center: Point2, radius: f64, attrs: &SharedAttributes) -> EntityId {
        self.add(Entity::Circle(Circle {
            center,
            radius,
            style: attrs.style(),
        }))
    }

    pub fn add_polyline(
        &mut self,
        vertices: Vec<Point2>,
        is_closed: bool,
        attrs: &SharedAttributes,
    ) -> EntityId {
        self.add(Entity::Polyline(Polyline {
            vertices,
            is_closed,
            style: attrs.style(),
        }))
    }

    pub fn add_text(
        &mut self,
        insert: Point2,
        content: impl Into<String>,
        height: f64,
        align: TextAlign,
        attrs: &SharedAttributes,
    ) -> EntityId {
        self.add(Entity::Text(Text {
            insert,
            content: content.into(),
            height,
            rotation: 0.0,
            align,
            style: attrs.style(),
        }))
    }
}
