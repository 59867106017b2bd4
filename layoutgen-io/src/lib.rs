use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;
use layoutgen_core::{
    document::{
        BlockDefinition, Dimension, DimensionKind, Document, Entity, EntityStyle, Hatch,
        HatchPattern, Layer, Linetype, MText, Text, TextAlign, CONTINUOUS, LAYER_ZERO,
    },
    geometry::{Point2, Point3},
};

/// 写出的 DXF 版本（AutoCAD 2000）。
pub const ACAD_VERSION: &str = "AC1015";
const MTEXT_CHUNK: usize = 250;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write DXF stream: {0}")]
    Stream(#[from] std::io::Error),
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentSaver: Send + Sync {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// ASCII DXF 写出器。
#[derive(Debug, Default, Clone, Copy)]
pub struct DxfWriter;

impl DxfWriter {
    pub fn new() -> Self {
        Self
    }

    /// 将文档写入任意输出流。
    pub fn write_to<W: Write>(&self, document: &Document, out: W) -> Result<(), IoError> {
        let mut emitter = Emitter::new(out);
        emitter.document(document)?;
        emitter.finish()
    }

    /// 写入内存缓冲区。
    pub fn to_bytes(&self, document: &Document) -> Result<Vec<u8>, IoError> {
        let mut buffer = Vec::new();
        self.write_to(document, &mut buffer)?;
        Ok(buffer)
    }
}

impl DocumentSaver for DxfWriter {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let wrap = |source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(wrap)?;
        match self.write_to(document, BufWriter::new(file)) {
            Err(IoError::Stream(source)) => Err(wrap(source)),
            other => other,
        }
    }
}

struct Emitter<W: Write> {
    out: W,
    next_handle: u64,
}

impl<W: Write> Emitter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            next_handle: 0x20,
        }
    }

    fn finish(mut self) -> Result<(), IoError> {
        self.out.flush()?;
        Ok(())
    }

    fn pair(&mut self, code: i32, value: impl std::fmt::Display) -> Result<(), IoError> {
        let value = value.to_string();
        if value.contains(['\r', '\n']) {
            return Err(IoError::InvalidDocument(format!(
                "group code {code} value contains a line break: {value:?}"
            )));
        }
        writeln!(self.out, "{code:>3}")?;
        writeln!(self.out, "{value}")?;
        Ok(())
    }

    fn float(&mut self, code: i32, value: f64) -> Result<(), IoError> {
        if !value.is_finite() {
            return Err(IoError::InvalidDocument(format!(
                "group code {code} carries non-finite value {value}"
            )));
        }
        self.pair(code, format_args!("{value:.6}"))
    }

    fn point2(&mut self, base: i32, point: Point2) -> Result<(), IoError> {
        self.point3(base, point.extend(0.0))
    }

    fn point3(&mut self, base: i32, point: Point3) -> Result<(), IoError> {
        self.float(base, point.x())?;
        self.float(base + 10, point.y())?;
        self.float(base + 20, point.z())
    }

    fn handle(&mut self) -> Result<(), IoError> {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.pair(5, format_args!("{handle:X}"))
    }

    fn begin_section(&mut self, name: &str) -> Result<(), IoError> {
        self.pair(0, "SECTION")?;
        self.pair(2, name)
    }

    fn end_section(&mut self) -> Result<(), IoError> {
        self.pair(0, "ENDSEC")
    }

    fn document(&mut self, document: &Document) -> Result<(), IoError> {
        self.header(document)?;
        self.tables(document)?;
        self.blocks(document)?;

        self.begin_section("ENTITIES")?;
        for (_, entity) in document.entities() {
            self.entity(entity)?;
        }
        self.end_section()?;

        self.pair(0, "EOF")
    }

    fn header(&mut self, document: &Document) -> Result<(), IoError> {
        let header = document.header();
        self.begin_section("HEADER")?;
        self.pair(9, "$ACADVER")?;
        self.pair(1, ACAD_VERSION)?;
        self.pair(9, "$INSUNITS")?;
        self.pair(70, header.units)?;
        self.pair(9, "$MEASUREMENT")?;
        self.pair(70, 1)?;
        if let Some(extents) = header.extents {
            self.pair(9, "$EXTMIN")?;
            self.point2(10, extents.min())?;
            self.pair(9, "$EXTMAX")?;
            self.point2(10, extents.max())?;
        }
        if let Some(ucs) = header.ucs {
            self.pair(9, "$UCSORG")?;
            self.point2(10, ucs.origin)?;
            self.pair(9, "$UCSXDIR")?;
            self.point3(10, Point3::new(ucs.x_axis.x(), ucs.x_axis.y(), 0.0))?;
            self.pair(9, "$UCSYDIR")?;
            self.point3(10, Point3::new(ucs.y_axis.x(), ucs.y_axis.y(), 0.0))?;
        }
        self.end_section()
    }

    fn tables(&mut self, document: &Document) -> Result<(), IoError> {
        self.begin_section("TABLES")?;

        let mut linetypes: Vec<&Linetype> = document.linetypes().collect();
        linetypes.sort_by(|a, b| a.name.cmp(&b.name));
        self.begin_table("LTYPE", linetypes.len() + 3)?;
        for name in ["BYBLOCK", "BYLAYER", CONTINUOUS] {
            self.linetype_record(name, if name == CONTINUOUS { "Solid line" } else { "" }, &[])?;
        }
        for linetype in linetypes {
            if linetype.name.eq_ignore_ascii_case(CONTINUOUS) {
                continue;
            }
            self.linetype_record(&linetype.name, &linetype.description, &linetype.pattern)?;
        }
        self.pair(0, "ENDTAB")?;

        let mut layers: Vec<&Layer> = document.layers().collect();
        layers.sort_by(|a, b| match (a.name == LAYER_ZERO, b.name == LAYER_ZERO) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });
        self.begin_table("LAYER", layers.len())?;
        for layer in layers {
            self.layer_record(layer)?;
        }
        self.pair(0, "ENDTAB")?;

        self.begin_table("STYLE", 1)?;
        self.pair(0, "STYLE")?;
        self.handle()?;
        self.pair(100, "AcDbSymbolTableRecord")?;
        self.pair(100, "AcDbTextStyleTableRecord")?;
        self.pair(2, "STANDARD")?;
        self.pair(70, 0)?;
        self.float(40, 0.0)?;
        self.float(41, 1.0)?;
        self.pair(3, "txt")?;
        self.pair(0, "ENDTAB")?;

        if let Some(ucs) = document.header().ucs {
            self.begin_table("UCS", 1)?;
            self.pair(0, "UCS")?;
            self.handle()?;
            self.pair(100, "AcDbSymbolTableRecord")?;
            self.pair(100, "AcDbUCSTableRecord")?;
            self.pair(2, "LAYOUT")?;
            self.pair(70, 0)?;
            self.point2(10, ucs.origin)?;
            self.point3(11, Point3::new(ucs.x_axis.x(), ucs.x_axis.y(), 0.0))?;
            self.point3(12, Point3::new(ucs.y_axis.x(), ucs.y_axis.y(), 0.0))?;
            self.pair(0, "ENDTAB")?;
        }

        self.end_section()
    }

    fn begin_table(&mut self, name: &str, count: usize) -> Result<(), IoError> {
        self.pair(0, "TABLE")?;
        self.pair(2, name)?;
        self.handle()?;
        self.pair(100, "AcDbSymbolTable")?;
        self.pair(70, count)
    }

    fn linetype_record(&mut self, name: &str, description: &str, pattern: &[f64]) -> Result<(), IoError> {
        self.pair(0, "LTYPE")?;
        self.handle()?;
        self.pair(100, "AcDbSymbolTableRecord")?;
        self.pair(100, "AcDbLinetypeTableRecord")?;
        self.pair(2, name)?;
        self.pair(70, 0)?;
        self.pair(3, description)?;
        self.pair(72, 65)?;
        self.pair(73, pattern.len())?;
        self.float(40, pattern.iter().map(|segment| segment.abs()).sum())?;
        for segment in pattern {
            self.float(49, *segment)?;
            self.pair(74, 0)?;
        }
        Ok(())
    }

    fn layer_record(&mut self, layer: &Layer) -> Result<(), IoError> {
        let mut flags = 0;
        if layer.is_frozen {
            flags |= 1;
        }
        if layer.is_locked {
            flags |= 4;
        }
        // 负颜色号表示图层关闭。
        let color = if layer.is_visible {
            layer.color.abs()
        } else {
            -layer.color.abs()
        };
        self.pair(0, "LAYER")?;
        self.handle()?;
        self.pair(100, "AcDbSymbolTableRecord")?;
        self.pair(100, "AcDbLayerTableRecord")?;
        self.pair(2, &layer.name)?;
        self.pair(70, flags)?;
        self.pair(62, color)?;
        self.pair(6, &layer.linetype)
    }

    fn blocks(&mut self, document: &Document) -> Result<(), IoError> {
        self.begin_section("BLOCKS")?;
        let mut blocks: Vec<&BlockDefinition> = document.blocks().collect();
        blocks.sort_by(|a, b| a.name.cmp(&b.name));
        for block in blocks {
            self.pair(0, "BLOCK")?;
            self.handle()?;
            self.pair(100, "AcDbEntity")?;
            self.pair(8, LAYER_ZERO)?;
            self.pair(100, "AcDbBlockBegin")?;
            self.pair(2, &block.name)?;
            self.pair(70, 0)?;
            self.point2(10, block.base_point)?;
            self.pair(3, &block.name)?;
            self.pair(1, "")?;
            for entity in &block.entities {
                self.entity(entity)?;
            }
            self.pair(0, "ENDBLK")?;
            self.handle()?;
            self.pair(100, "AcDbEntity")?;
            self.pair(8, LAYER_ZERO)?;
            self.pair(100, "AcDbBlockEnd")?;
        }
        self.end_section()
    }

    fn entity_head(&mut self, name: &str, style: &EntityStyle) -> Result<(), IoError> {
        self.pair(0, name)?;
        self.handle()?;
        self.pair(100, "AcDbEntity")?;
        self.pair(8, &style.layer)?;
        if let Some(linetype) = &style.linetype {
            self.pair(6, linetype)?;
        }
        if let Some(color) = style.color {
            self.pair(62, color)?;
        }
        Ok(())
    }

    fn entity(&mut self, entity: &Entity) -> Result<(), IoError> {
        self.entity_head(entity.dxf_name(), entity.style())?;
        match entity {
            Entity::Line(line) => {
                self.pair(100, "AcDbLine")?;
                self.point2(10, line.start)?;
                self.point2(11, line.end)
            }
            Entity::Circle(circle) => {
                self.pair(100, "AcDbCircle")?;
                self.point2(10, circle.center)?;
                self.float(40, circle.radius)
            }
            Entity::Arc(arc) => {
                self.pair(100, "AcDbCircle")?;
                self.point2(10, arc.center)?;
                self.float(40, arc.radius)?;
                self.pair(100, "AcDbArc")?;
                self.float(50, arc.start_angle.to_degrees())?;
                self.float(51, arc.end_angle.to_degrees())
            }
            Entity::Ellipse(ellipse) => {
                self.pair(100, "AcDbEllipse")?;
                self.point2(10, ellipse.center)?;
                self.point3(11, Point3::new(ellipse.major_axis.x(), ellipse.major_axis.y(), 0.0))?;
                self.float(40, ellipse.ratio)?;
                self.float(41, ellipse.start_parameter)?;
                self.float(42, ellipse.end_parameter)
            }
            Entity::Polyline(polyline) => {
                self.pair(100, "AcDbPolyline")?;
                self.pair(90, polyline.vertices.len())?;
                self.pair(70, i32::from(polyline.is_closed))?;
                for vertex in &polyline.vertices {
                    self.float(10, vertex.x())?;
                    self.float(20, vertex.y())?;
                }
                Ok(())
            }
            Entity::Polyline3D(polyline) => {
                self.pair(100, "AcDb3dPolyline")?;
                self.pair(66, 1)?;
                self.point3(10, Point3::new(0.0, 0.0, 0.0))?;
                self.pair(70, 8 | i32::from(polyline.is_closed))?;
                for vertex in &polyline.vertices {
                    self.entity_head("VERTEX", &polyline.style)?;
                    self.pair(100, "AcDbVertex")?;
                    self.pair(100, "AcDb3dPolylineVertex")?;
                    self.point3(10, *vertex)?;
                    self.pair(70, 32)?;
                }
                self.entity_head("SEQEND", &polyline.style)
            }
            Entity::Spline(spline) => {
                let flags = 8 | i32::from(spline.is_closed);
                self.pair(100, "AcDbSpline")?;
                self.pair(70, flags)?;
                self.pair(71, spline.degree)?;
                self.pair(72, spline.knot_values.len())?;
                self.pair(73, spline.control_points.len())?;
                self.pair(74, 0)?;
                for knot in &spline.knot_values {
                    self.float(40, *knot)?;
                }
                for point in &spline.control_points {
                    self.point2(10, *point)?;
                }
                Ok(())
            }
            Entity::Text(text) => self.text(text),
            Entity::MText(mtext) => self.mtext(mtext),
            Entity::Hatch(hatch) => self.hatch(hatch),
            Entity::Dimension(dimension) => self.dimension(dimension),
            Entity::Leader(leader) => {
                self.pair(100, "AcDbLeader")?;
                self.pair(3, "STANDARD")?;
                self.pair(71, i32::from(leader.has_arrowhead))?;
                self.pair(72, 0)?;
                self.pair(73, 3)?;
                self.pair(76, leader.vertices.len())?;
                for vertex in &leader.vertices {
                    self.point2(10, *vertex)?;
                }
                Ok(())
            }
            Entity::Face3D(face) => {
                self.pair(100, "AcDbFace")?;
                for (index, vertex) in face.vertices.iter().enumerate() {
                    self.point3(10 + index as i32, *vertex)?;
                }
                Ok(())
            }
        }
    }

    fn text(&mut self, text: &Text) -> Result<(), IoError> {
        let (horizontal, vertical) = match text.align {
            TextAlign::Left => (0, 0),
            TextAlign::Center => (1, 0),
            TextAlign::Right => (2, 0),
            TextAlign::Middle => (1, 2),
        };
        self.pair(100, "AcDbText")?;
        self.point2(10, text.insert)?;
        self.float(40, text.height)?;
        self.pair(1, single_line(&text.content))?;
        self.float(50, text.rotation)?;
        if horizontal != 0 || vertical != 0 {
            self.pair(72, horizontal)?;
            self.point2(11, text.insert)?;
        }
        self.pair(100, "AcDbText")?;
        if vertical != 0 {
            self.pair(73, vertical)?;
        }
        Ok(())
    }

    fn mtext(&mut self, mtext: &MText) -> Result<(), IoError> {
        self.pair(100, "AcDbMText")?;
        self.point2(10, mtext.insert)?;
        self.float(40, mtext.height)?;
        if let Some(width) = mtext.reference_width {
            self.float(41, width)?;
        }
        self.pair(71, mtext.attachment_point)?;
        self.pair(72, 1)?;
        let content = mtext.content.replace("\r\n", "\\P").replace(['\r', '\n'], "\\P");
        let chars: Vec<char> = content.chars().collect();
        let mut chunks = chars.chunks(MTEXT_CHUNK).peekable();
        if chunks.peek().is_none() {
            self.pair(1, "")?;
        }
        while let Some(chunk) = chunks.next() {
            let code = if chunks.peek().is_some() { 3 } else { 1 };
            self.pair(code, chunk.iter().collect::<String>())?;
        }
        self.float(50, mtext.rotation)
    }

    fn hatch(&mut self, hatch: &Hatch) -> Result<(), IoError> {
        self.pair(100, "AcDbHatch")?;
        self.point3(10, Point3::new(0.0, 0.0, 0.0))?;
        self.point3(210, Point3::new(0.0, 0.0, 1.0))?;
        self.pair(2, hatch.pattern.name())?;
        self.pair(70, i32::from(hatch.pattern == HatchPattern::Solid))?;
        self.pair(71, 0)?;
        self.pair(91, 1)?;
        // 多段线边界回路（外部 + 多段线）。
        self.pair(92, 3)?;
        self.pair(72, 0)?;
        self.pair(73, 1)?;
        self.pair(93, hatch.boundary.len())?;
        for point in &hatch.boundary {
            self.float(10, point.x())?;
            self.float(20, point.y())?;
        }
        self.pair(97, 0)?;
        self.pair(75, 0)?;
        self.pair(76, 1)?;
        if let HatchPattern::Named { scale, angle, .. } = &hatch.pattern {
            self.float(52, *angle)?;
            self.float(41, *scale)?;
            self.pair(77, 0)?;
            self.pair(78, 0)?;
        }
        self.pair(98, 0)
    }

    fn dimension(&mut self, dimension: &Dimension) -> Result<(), IoError> {
        self.pair(100, "AcDbDimension")?;
        self.point2(10, dimension.definition_point)?;
        self.point2(11, dimension.text_midpoint)?;
        self.pair(70, dimension.kind.type_code())?;
        self.pair(1, single_line(dimension.text.as_deref().unwrap_or("")))?;
        self.pair(3, "STANDARD")?;
        match dimension.kind {
            DimensionKind::Linear => {
                self.pair(100, "AcDbAlignedDimension")?;
                self.optional_point(13, dimension.extension_line_origin)?;
                self.optional_point(14, dimension.extension_line_end)?;
                self.float(50, dimension.rotation)?;
                self.pair(100, "AcDbRotatedDimension")
            }
            DimensionKind::Radius => {
                self.pair(100, "AcDbRadialDimension")?;
                self.optional_point(15, dimension.secondary_point)?;
                self.float(40, 0.0)
            }
            DimensionKind::Diameter => {
                self.pair(100, "AcDbDiametricDimension")?;
                self.optional_point(15, dimension.secondary_point)?;
                self.float(40, 0.0)
            }
            DimensionKind::Angular => {
                self.pair(100, "AcDb3PointAngularDimension")?;
                self.optional_point(13, dimension.extension_line_origin)?;
                self.optional_point(14, dimension.extension_line_end)?;
                self.optional_point(15, dimension.secondary_point)
            }
        }
    }

    fn optional_point(&mut self, base: i32, point: Option<Point2>) -> Result<(), IoError> {
        match point {
            Some(point) => self.point2(base, point),
            None => Err(IoError::InvalidDocument(format!(
                "dimension is missing point for group code {base}"
            ))),
        }
    }
}

fn single_line(content: &str) -> String {
    content.replace(['\r', '\n'], " ")
}
