pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，保持双精度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn extend(self, z: f64) -> Point3 {
            Point3::new(self.x(), self.y(), z)
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 二维向量，用于主轴、偏移与坐标系轴向。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        /// 归一化；长度退化时返回 None。
        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }
    }

    /// 三维点，供 3D 多段线与 3DFACE 代理使用。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn truncate(self) -> Point2 {
            Point2::new(self.x(), self.y())
        }
    }

    /// 轴对齐边界框，用于计算图纸范围（$EXTMIN / $EXTMAX）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        /// 空框：min 为正无穷、max 为负无穷，吸收任意点后即有效。
        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        /// 由点集构造；点集为空时返回 None。
        pub fn from_points(points: impl IntoIterator<Item = Point2>) -> Option<Self> {
            let mut bounds = Self::empty();
            for point in points {
                bounds.include_point(point);
            }
            (!bounds.is_empty()).then_some(bounds)
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn include_point(&mut self, point: Point2) {
            self.min = Point2(self.min.0.min(point.0));
            self.max = Point2(self.max.0.max(point.0));
        }

        pub fn union(self, other: Self) -> Self {
            Self {
                min: Point2(self.min.0.min(other.min.0)),
                max: Point2(self.max.0.max(other.max.0)),
            }
        }
    }
}

pub mod document {
    use std::collections::HashMap;
    use std::f64::consts::{FRAC_PI_2, TAU};

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Point3, Vector2};

    /// DXF 中永远存在的 0 图层。
    pub const LAYER_ZERO: &str = "0";
    /// 默认颜色号（白/黑）。
    pub const DEFAULT_COLOR: i16 = 7;
    pub const CONTINUOUS: &str = "CONTINUOUS";
    /// $INSUNITS = 4 表示毫米。
    pub const UNITS_MILLIMETERS: i16 = 4;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub color: i16,
        pub linetype: String,
        pub is_visible: bool,
        pub is_frozen: bool,
        pub is_locked: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self::with_color(name, DEFAULT_COLOR)
        }

        pub fn with_color(name: impl Into<String>, color: i16) -> Self {
            Self {
                name: name.into(),
                color,
                linetype: CONTINUOUS.to_string(),
                is_visible: true,
                is_frozen: false,
                is_locked: false,
            }
        }
    }

    /// 图层声明结果。重复声明保留首个定义。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LayerDeclaration {
        Created,
        Duplicate,
    }

    /// 自定义线型：正数为实线段，负数为空白段，0 为点。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Linetype {
        pub name: String,
        pub description: String,
        pub pattern: Vec<f64>,
    }

    impl Linetype {
        pub fn total_length(&self) -> f64 {
            self.pattern.iter().map(|segment| segment.abs()).sum()
        }
    }

    /// 命名图层状态快照，记录某个图层被设置后的开关状态。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LayerStateRecord {
        pub name: String,
        pub layer: String,
        pub is_visible: bool,
        pub is_frozen: bool,
        pub is_locked: bool,
    }

    /// 用户坐标系，轴向已归一化。
    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    pub struct Ucs {
        pub origin: Point2,
        pub x_axis: Vector2,
        pub y_axis: Vector2,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DrawingHeader {
        pub units: i16,
        pub ucs: Option<Ucs>,
        pub extents: Option<Bounds2D>,
    }

    impl Default for DrawingHeader {
        fn default() -> Self {
            Self {
                units: UNITS_MILLIMETERS,
                ucs: None,
                extents: None,
            }
        }
    }

    /// 实体共享属性：所在图层与可选的颜色覆盖（None 表示随层）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EntityStyle {
        pub layer: String,
        pub color: Option<i16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub linetype: Option<String>,
    }

    impl EntityStyle {
        #[inline]
        pub fn on_layer(layer: impl Into<String>) -> Self {
            Self {
                layer: layer.into(),
                color: None,
                linetype: None,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Ellipse(Ellipse),
        Polyline(Polyline),
        Polyline3D(Polyline3D),
        Spline(Spline),
        Text(Text),
        MText(MText),
        Hatch(Hatch),
        Dimension(Dimension),
        Leader(Leader),
        Face3D(ThreeDFace),
    }

    impl Entity {
        pub fn style(&self) -> &EntityStyle {
            match self {
                Entity::Line(line) => &line.style,
                Entity::Circle(circle) => &circle.style,
                Entity::Arc(arc) => &arc.style,
                Entity::Ellipse(ellipse) => &ellipse.style,
                Entity::Polyline(polyline) => &polyline.style,
                Entity::Polyline3D(polyline) => &polyline.style,
                Entity::Spline(spline) => &spline.style,
                Entity::Text(text) => &text.style,
                Entity::MText(mtext) => &mtext.style,
                Entity::Hatch(hatch) => &hatch.style,
                Entity::Dimension(dimension) => &dimension.style,
                Entity::Leader(leader) => &leader.style,
                Entity::Face3D(face) => &face.style,
            }
        }

        #[inline]
        pub fn layer_name(&self) -> &str {
            &self.style().layer
        }

        /// DXF 实体名称。
        pub fn dxf_name(&self) -> &'static str {
            match self {
                Entity::Line(_) => "LINE",
                Entity::Circle(_) => "CIRCLE",
                Entity::Arc(_) => "ARC",
                Entity::Ellipse(_) => "ELLIPSE",
                Entity::Polyline(_) => "LWPOLYLINE",
                Entity::Polyline3D(_) => "POLYLINE",
                Entity::Spline(_) => "SPLINE",
                Entity::Text(_) => "TEXT",
                Entity::MText(_) => "MTEXT",
                Entity::Hatch(_) => "HATCH",
                Entity::Dimension(_) => "DIMENSION",
                Entity::Leader(_) => "LEADER",
                Entity::Face3D(_) => "3DFACE",
            }
        }

        /// 计算实体的 2D 轴对齐范围，文本类实体退化为插入点。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let points: Vec<Point2> = match self {
                Entity::Line(line) => vec![line.start, line.end],
                Entity::Circle(circle) => {
                    let (center, radius) = (circle.center, circle.radius.abs());
                    vec![
                        Point2::new(center.x() - radius, center.y() - radius),
                        Point2::new(center.x() + radius, center.y() + radius),
                    ]
                }
                Entity::Arc(arc) => arc_extremes(arc.center, arc.radius, arc.start_angle, arc.end_angle),
                Entity::Ellipse(ellipse) => ellipse_samples(ellipse),
                Entity::Polyline(polyline) => polyline.vertices.clone(),
                Entity::Polyline3D(polyline) => polyline.vertices.iter().map(|v| v.truncate()).collect(),
                Entity::Spline(spline) => spline.control_points.clone(),
                Entity::Text(text) => vec![text.insert],
                Entity::MText(mtext) => vec![mtext.insert],
                Entity::Hatch(hatch) => hatch.boundary.clone(),
                Entity::Dimension(dimension) => [
                    Some(dimension.definition_point),
                    Some(dimension.text_midpoint),
                    dimension.extension_line_origin,
                    dimension.extension_line_end,
                    dimension.secondary_point,
                ]
                .into_iter()
                .flatten()
                .collect(),
                Entity::Leader(leader) => leader.vertices.clone(),
                Entity::Face3D(face) => face.vertices.iter().map(|v| v.truncate()).collect(),
            };
            Bounds2D::from_points(points)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub style: EntityStyle,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub style: EntityStyle,
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub style: EntityStyle,
    }

    /// 椭圆实体，记录主轴向量与参数范围（单位为弧度）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point2,
        pub major_axis: Vector2,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
        pub style: EntityStyle,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<Point2>,
        pub is_closed: bool,
        pub style: EntityStyle,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline3D {
        pub vertices: Vec<Point3>,
        pub is_closed: bool,
        pub style: EntityStyle,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Spline {
        pub degree: i32,
        pub is_closed: bool,
        pub control_points: Vec<Point2>,
        pub knot_values: Vec<f64>,
        pub style: EntityStyle,
    }

    impl Spline {
        /// 以钳制均匀节点向量构造样条，阶数自动限制在控制点数量之内。
        pub fn clamped(
            degree: i32,
            is_closed: bool,
            control_points: Vec<Point2>,
            style: EntityStyle,
        ) -> Self {
            let count = control_points.len() as i32;
            let degree = degree.clamp(1, (count - 1).max(1));
            let knot_values = clamped_uniform_knots(degree as usize, control_points.len());
            Self {
                degree,
                is_closed,
                control_points,
                knot_values,
                style,
            }
        }
    }

    fn clamped_uniform_knots(degree: usize, count: usize) -> Vec<f64> {
        let interior = count.saturating_sub(degree + 1);
        let span = (interior + 1) as f64;
        let mut knots = Vec::with_capacity(count + degree + 1);
        knots.extend(std::iter::repeat_n(0.0, degree + 1));
        for i in 1..=interior {
            knots.push(i as f64 / span);
        }
        knots.extend(std::iter::repeat_n(1.0, degree + 1));
        knots
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum TextAlign {
        Left,
        Center,
        Right,
        /// 水平、垂直都居中。
        Middle,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub align: TextAlign,
        pub style: EntityStyle,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MText {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub reference_width: Option<f64>,
        /// 组码 71：1 左上、2 中上、3 右上。
        pub attachment_point: i16,
        pub rotation: f64,
        pub style: EntityStyle,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum HatchPattern {
        Solid,
        Named { name: String, scale: f64, angle: f64 },
    }

    impl HatchPattern {
        pub fn name(&self) -> &str {
            match self {
                HatchPattern::Solid => "SOLID",
                HatchPattern::Named { name, .. } => name,
            }
        }
    }

    /// 单一多边形边界的填充。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Hatch {
        pub pattern: HatchPattern,
        pub boundary: Vec<Point2>,
        pub style: EntityStyle,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum DimensionKind {
        Linear,
        Angular,
        Diameter,
        Radius,
    }

    impl DimensionKind {
        /// 组码 70 的类型值。
        pub fn type_code(self) -> i16 {
            match self {
                DimensionKind::Linear => 0,
                DimensionKind::Diameter => 3,
                DimensionKind::Radius => 4,
                DimensionKind::Angular => 5,
            }
        }
    }

    /// 标注实体。各点含义随类型变化：
    /// 线性标注中 `definition_point` 位于尺寸线上，`extension_line_*` 为两个测量点；
    /// 半径/直径标注中 `definition_point` 为圆心（直径时为对侧点），`secondary_point` 为圆上点；
    /// 角度标注中 `definition_point` 为弧线位置，`secondary_point` 为顶点。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Dimension {
        pub kind: DimensionKind,
        pub definition_point: Point2,
        pub text_midpoint: Point2,
        pub extension_line_origin: Option<Point2>,
        pub extension_line_end: Option<Point2>,
        pub secondary_point: Option<Point2>,
        pub text: Option<String>,
        pub rotation: f64,
        pub style: EntityStyle,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Leader {
        pub vertices: Vec<Point2>,
        pub has_arrowhead: bool,
        pub style: EntityStyle,
    }

    /// 3D 面（3DFACE），实体/网格代理使用；三角面以重复末顶点补齐为四边。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ThreeDFace {
        pub vertices: [Point3; 4],
        pub style: EntityStyle,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockDefinition {
        pub name: String,
        pub base_point: Point2,
        pub entities: Vec<Entity>,
    }

    impl BlockDefinition {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                base_point: Point2::new(0.0, 0.0),
                entities: Vec::new(),
            }
        }
    }

    /// 实体写入位置：模型空间或指定块。
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum EntitySpace {
        Model,
        Block(String),
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        header: DrawingHeader,
        layers: HashMap<String, Layer>,
        linetypes: HashMap<String, Linetype>,
        layer_states: Vec<LayerStateRecord>,
        entities: Vec<(EntityId, Entity)>,
        blocks: HashMap<String, BlockDefinition>,
        next_entity_id: u64,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer(LAYER_ZERO);
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        /// 声明图层。同名图层已存在时保留原定义并返回 `Duplicate`。
        pub fn declare_layer(&mut self, name: impl Into<String>, color: i16) -> LayerDeclaration {
            let name = name.into();
            if self.layers.contains_key(&name) {
                return LayerDeclaration::Duplicate;
            }
            self.layers
                .insert(name.clone(), Layer::with_color(name, color));
            LayerDeclaration::Created
        }

        #[inline]
        pub fn has_layer(&self, name: &str) -> bool {
            self.layers.contains_key(name)
        }

        #[inline]
        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers.get(name)
        }

        #[inline]
        pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
            self.layers.get_mut(name)
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        /// 定义线型，同名线型已存在时保留原定义并返回 false。
        pub fn define_linetype(&mut self, linetype: Linetype) -> bool {
            if self.linetypes.contains_key(&linetype.name) {
                return false;
            }
            self.linetypes.insert(linetype.name.clone(), linetype);
            true
        }

        #[inline]
        pub fn linetype(&self, name: &str) -> Option<&Linetype> {
            self.linetypes.get(name)
        }

        #[inline]
        pub fn linetypes(&self) -> impl Iterator<Item = &Linetype> {
            self.linetypes.values()
        }

        pub fn record_layer_state(&mut self, record: LayerStateRecord) {
            self.layer_states.push(record);
        }

        #[inline]
        pub fn layer_states(&self) -> &[LayerStateRecord] {
            &self.layer_states
        }

        /// 文档级状态记录数（线型定义 + 图层状态）。
        #[inline]
        pub fn state_record_count(&self) -> usize {
            self.linetypes.len() + self.layer_states.len()
        }

        #[inline]
        pub fn header(&self) -> &DrawingHeader {
            &self.header
        }

        pub fn set_ucs(&mut self, ucs: Ucs) {
            self.header.ucs = Some(ucs);
        }

        /// 向模型空间追加实体，并确保其图层存在。
        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        /// 创建空块定义。同名块已存在时返回 false。
        pub fn add_block_definition(&mut self, definition: BlockDefinition) -> bool {
            if self.blocks.contains_key(&definition.name) {
                return false;
            }
            self.blocks.insert(definition.name.clone(), definition);
            true
        }

        /// 向块追加实体；块不存在时自动创建。
        pub fn add_block_entity(&mut self, block: &str, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name());
            let id = self.next_id();
            self.blocks
                .entry(block.to_string())
                .or_insert_with(|| BlockDefinition::new(block))
                .entities
                .push(entity);
            id
        }

        pub fn insert(&mut self, space: &EntitySpace, entity: Entity) -> EntityId {
            match space {
                EntitySpace::Model => self.add_entity(entity),
                EntitySpace::Block(name) => self.add_block_entity(name, entity),
            }
        }

        /// 指定空间内的实体数量。
        pub fn space_entity_count(&self, space: &EntitySpace) -> usize {
            match space {
                EntitySpace::Model => self.entities.len(),
                EntitySpace::Block(name) => self
                    .blocks
                    .get(name)
                    .map(|block| block.entities.len())
                    .unwrap_or(0),
            }
        }

        #[inline]
        pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
            self.blocks.get(name)
        }

        #[inline]
        pub fn blocks(&self) -> impl Iterator<Item = &BlockDefinition> {
            self.blocks.values()
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            self.entities
                .iter()
                .filter_map(|(_, entity)| entity.bounds())
                .reduce(Bounds2D::union)
        }

        /// 根据模型空间实体刷新头部范围，返回新范围。
        pub fn refresh_extents(&mut self) -> Option<Bounds2D> {
            self.header.extents = self.bounds();
            self.header.extents
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    /// 逆时针扫过的弧度；起止重合视为整圈。
    fn sweep(start: f64, end: f64) -> f64 {
        let span = (end - start).rem_euclid(TAU);
        if span < 1e-9 { TAU } else { span }
    }

    fn on_circle(center: Point2, radius: f64, angle: f64) -> Point2 {
        center.translate(Vector2::new(radius * angle.cos(), radius * angle.sin()))
    }

    /// 圆弧两端点加上弧经过的轴向极值点。
    fn arc_extremes(center: Point2, radius: f64, start_angle: f64, end_angle: f64) -> Vec<Point2> {
        let radius = radius.abs();
        let stop = start_angle + sweep(start_angle, end_angle);
        let mut points = vec![
            on_circle(center, radius, start_angle),
            on_circle(center, radius, stop),
        ];
        let mut extreme = (start_angle / FRAC_PI_2).ceil() * FRAC_PI_2;
        while extreme <= stop {
            points.push(on_circle(center, radius, extreme));
            extreme += FRAC_PI_2;
        }
        points
    }

    /// 沿参数区间采样椭圆，近似其范围。
    fn ellipse_samples(ellipse: &Ellipse) -> Vec<Point2> {
        let major = ellipse.major_axis.as_vec2();
        let minor = major.perp() * ellipse.ratio.abs();
        let start = ellipse.start_parameter;
        let span = sweep(start, ellipse.end_parameter);
        let steps = (span / TAU * 64.0).ceil().max(16.0) as usize;
        (0..=steps)
            .map(|i| {
                let t = start + span * i as f64 / steps as f64;
                Point2(ellipse.center.as_vec2() + major * t.cos() + minor * t.sin())
            })
            .collect()
    }

}
