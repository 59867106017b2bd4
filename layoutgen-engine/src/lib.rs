pub mod artifact;
pub mod entity;
pub mod factory;
pub mod generator;
pub mod instructions;
pub mod processors;
pub mod request;
pub mod summary;
pub mod template;

pub mod errors {
    use layoutgen_io::IoError;
    use serde_json::Value;
    use thiserror::Error;

    /// 几何校验失败，携带出错的原始值。
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum ValidationError {
        #[error("expected a coordinate sequence, got {0}")]
        NotASequence(Value),
        #[error("expected at least {min} coordinates, got {found} in {value}")]
        TooFewCoordinates { min: usize, found: usize, value: Value },
        #[error("value {0} is not numeric")]
        NonNumeric(Value),
        #[error("value {0} must be positive")]
        NonPositive(f64),
        #[error("angle {value} outside [{min}, {max}]")]
        AngleOutOfRange { value: f64, min: f64, max: f64 },
    }

    /// 单个实体的处理失败。总是在工厂边界内被记录，不会中断整批处理。
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum EntityError {
        #[error("entity must be a JSON object")]
        NotAnObject,
        #[error("entity has no `type` tag")]
        MissingKind,
        #[error("unsupported entity type `{0}`")]
        UnsupportedKind(String),
        #[error("missing required field `{0}`")]
        MissingField(&'static str),
        #[error("invalid field `{field}`: {source}")]
        InvalidField {
            field: &'static str,
            #[source]
            source: ValidationError,
        },
        #[error("invalid geometry: {0}")]
        InvalidGeometry(String),
        #[error("`{field}` needs at least {min} items, got {found}")]
        TooFewItems {
            field: &'static str,
            min: usize,
            found: usize,
        },
        #[error("unknown {field} `{value}`")]
        UnknownVariant { field: &'static str, value: String },
        #[error("layer `{0}` not found")]
        LayerNotFound(String),
        #[error("mesh has no renderable faces")]
        NoRenderableFaces,
        #[error("block `{0}` already declared")]
        DuplicateBlock(String),
        #[error("`{field}` contains control characters: {value:?}")]
        InvalidName { field: &'static str, value: String },
    }

    impl EntityError {
        pub fn invalid(field: &'static str, source: ValidationError) -> Self {
            Self::InvalidField { field, source }
        }
    }

    /// 生成前被拒绝的请求。
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum RequestError {
        #[error("too many entities: {count} exceeds the limit of {limit}")]
        TooManyEntities { count: usize, limit: usize },
        #[error("mesh too large: {vertices} vertices exceeds the limit of {limit}")]
        MeshTooLarge { vertices: usize, limit: usize },
        #[error("{location} references undefined layer `{layer}`")]
        UndefinedLayer { layer: String, location: String },
        #[error("{location} has a {field} name with control characters: {value:?}")]
        InvalidName {
            field: &'static str,
            value: String,
            location: String,
        },
        #[error("invalid customization: {0}")]
        InvalidCustomization(String),
    }

    #[derive(Debug, Error)]
    pub enum GenerationError {
        #[error("failed to save DXF artifact: {0}")]
        Save(#[from] IoError),
        #[error("failed to prepare artifact: {0}")]
        Artifact(#[from] std::io::Error),
    }

    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum TemplateError {
        #[error("template `{name}` not found (available: {})", available.join(", "))]
        NotFound { name: String, available: Vec<String> },
        #[error("invalid dimensions: {0}")]
        InvalidDimensions(String),
    }
}

/// 宽松的坐标数值转换。
pub mod coordinates {
    use serde_json::Value;

    /// 转换结果：全部成功则给出浮点序列，否则原样返回输入。
    #[derive(Debug, Clone, PartialEq)]
    pub enum Coordinates {
        Converted(Vec<f64>),
        Unchanged(Vec<Value>),
    }

    impl Coordinates {
        #[inline]
        pub fn is_converted(&self) -> bool {
            matches!(self, Coordinates::Converted(_))
        }

        pub fn converted(self) -> Option<Vec<f64>> {
            match self {
                Coordinates::Converted(values) => Some(values),
                Coordinates::Unchanged(_) => None,
            }
        }
    }

    /// JSON 数值或可解析的数字字符串；布尔、null、非有限值都视为非数值。
    pub fn coerce_number(value: &Value) -> Option<f64> {
        let number = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        number.is_finite().then_some(number)
    }

    pub fn convert_coordinates(values: &[Value]) -> Coordinates {
        let converted: Option<Vec<f64>> = values.iter().map(coerce_number).collect();
        match converted {
            Some(numbers) => Coordinates::Converted(numbers),
            None => Coordinates::Unchanged(values.to_vec()),
        }
    }

}

/// 点、半径、角度的校验函数。
pub mod validation {
    use serde_json::Value;

    use crate::coordinates::{coerce_number, convert_coordinates, Coordinates};
    use crate::errors::ValidationError;

    pub const MIN_ANGLE: f64 = -360.0;
    pub const MAX_ANGLE: f64 = 360.0;

    pub fn validate_number(value: &Value) -> Result<f64, ValidationError> {
        coerce_number(value).ok_or_else(|| ValidationError::NonNumeric(value.clone()))
    }

    pub fn validate_point(value: &Value, min_coords: usize) -> Result<Vec<f64>, ValidationError> {
        let items = value
            .as_array()
            .ok_or_else(|| ValidationError::NotASequence(value.clone()))?;
        if items.len() < min_coords {
            return Err(ValidationError::TooFewCoordinates {
                min: min_coords,
                found: items.len(),
                value: value.clone(),
            });
        }
        match convert_coordinates(items) {
            Coordinates::Converted(numbers) => Ok(numbers),
            Coordinates::Unchanged(original) => {
                let offending = original
                    .into_iter()
                    .find(|item| coerce_number(item).is_none())
                    .unwrap_or(Value::Null);
                Err(ValidationError::NonNumeric(offending))
            }
        }
    }

    pub fn validate_radius(value: &Value) -> Result<f64, ValidationError> {
        let radius = validate_number(value)?;
        if radius <= 0.0 {
            return Err(ValidationError::NonPositive(radius));
        }
        Ok(radius)
    }

    pub fn validate_angle(value: &Value, min: f64, max: f64) -> Result<f64, ValidationError> {
        let angle = validate_number(value)?;
        if angle < min || angle > max {
            return Err(ValidationError::AngleOutOfRange {
                value: angle,
                min,
                max,
            });
        }
        Ok(angle)
    }

}
