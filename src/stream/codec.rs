//! Field codecs for the tuning stream
//!
//! Every sub-object has a symmetric write/read pair. All integers and floats
//! are big-endian.

use crate::display::{ScreenInfo, ScreenRect};
use crate::error::StreamError;
use crate::proj::{
    BlendMask, Brush, Color, Projector, StrokeBuffer, Tuning, WarpGrid, WarpInterpolation,
    WarpPoint,
};
use bytes::{Buf, BufMut};
use glam::{Vec2, Vec3};

/// Color spec written before the channels (1 = RGB)
const COLOR_SPEC_RGB: i8 = 1;
/// Largest raster accepted when reading (16k x 16k)
const MAX_MASK_PIXELS: u64 = 16384 * 16384;

/// Bounds-checked reader over a byte slice
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn peek(&self, len: usize) -> &'a [u8] {
        &self.buf[..len.min(self.buf.len())]
    }

    fn need(&self, field: &'static str, needed: usize) -> Result<(), StreamError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(StreamError::Truncated {
                field,
                needed,
                remaining,
            });
        }
        Ok(())
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8, StreamError> {
        self.need(field, 1)?;
        Ok(self.buf.get_u8())
    }

    pub fn i8(&mut self, field: &'static str) -> Result<i8, StreamError> {
        self.need(field, 1)?;
        Ok(self.buf.get_i8())
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16, StreamError> {
        self.need(field, 2)?;
        Ok(self.buf.get_u16())
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32, StreamError> {
        self.need(field, 4)?;
        Ok(self.buf.get_u32())
    }

    pub fn i32(&mut self, field: &'static str) -> Result<i32, StreamError> {
        self.need(field, 4)?;
        Ok(self.buf.get_i32())
    }

    pub fn f32(&mut self, field: &'static str) -> Result<f32, StreamError> {
        self.need(field, 4)?;
        Ok(self.buf.get_f32())
    }

    pub fn bool(&mut self, field: &'static str) -> Result<bool, StreamError> {
        match self.u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(StreamError::InvalidTag {
                field,
                value: value as u32,
            }),
        }
    }

    pub fn bytes(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], StreamError> {
        self.need(field, len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn string(&mut self, field: &'static str) -> Result<String, StreamError> {
        let len = self.u32(field)? as usize;
        let raw = self.bytes(field, len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| StreamError::InvalidUtf8(field))
    }

    fn vec2(&mut self, field: &'static str) -> Result<Vec2, StreamError> {
        Ok(Vec2::new(self.f32(field)?, self.f32(field)?))
    }

    fn vec3(&mut self, field: &'static str) -> Result<Vec3, StreamError> {
        Ok(Vec3::new(self.f32(field)?, self.f32(field)?, self.f32(field)?))
    }
}

fn put_string(buf: &mut impl BufMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn put_bool(buf: &mut impl BufMut, value: bool) {
    buf.put_u8(value as u8);
}

// Color: spec byte, 16-bit channels with alpha first, pad word

pub(crate) fn write_color(buf: &mut impl BufMut, color: Color) {
    buf.put_i8(COLOR_SPEC_RGB);
    for channel in [color.a, color.r, color.g, color.b] {
        buf.put_u16(channel as u16 * 257);
    }
    buf.put_u16(0);
}

pub(crate) fn read_color(r: &mut Reader) -> Result<Color, StreamError> {
    let spec = r.i8("color spec")?;
    if spec != COLOR_SPEC_RGB {
        return Err(StreamError::InvalidTag {
            field: "color spec",
            value: spec as u8 as u32,
        });
    }
    let a = r.u16("color alpha")?;
    let red = r.u16("color red")?;
    let green = r.u16("color green")?;
    let blue = r.u16("color blue")?;
    r.u16("color pad")?;
    Ok(Color::rgba(
        (red >> 8) as u8,
        (green >> 8) as u8,
        (blue >> 8) as u8,
        (a >> 8) as u8,
    ))
}

pub(crate) fn write_projector(buf: &mut impl BufMut, projector: &Projector) {
    buf.put_f32(projector.fov());
    buf.put_f32(projector.keystone());
    buf.put_f32(projector.yaw());
    buf.put_f32(projector.pitch());
    buf.put_f32(projector.roll());
    let position = projector.position();
    buf.put_f32(position.x);
    buf.put_f32(position.y);
    buf.put_f32(position.z);

    let (width, height) = projector.fallback_resolution();
    buf.put_u32(width);
    buf.put_u32(height);

    match projector.screen() {
        Some(screen) => {
            put_bool(buf, true);
            put_string(buf, &screen.id);
            buf.put_i32(screen.rect.x);
            buf.put_i32(screen.rect.y);
            buf.put_u32(screen.rect.width);
            buf.put_u32(screen.rect.height);
            buf.put_u32(screen.sub_screens);
        }
        None => put_bool(buf, false),
    }
    buf.put_u32(projector.sub_screen_index());
}

pub(crate) fn read_projector(r: &mut Reader) -> Result<Projector, StreamError> {
    let fov = r.f32("projector fov")?;
    let keystone = r.f32("projector keystone")?;
    let yaw = r.f32("projector yaw")?;
    let pitch = r.f32("projector pitch")?;
    let roll = r.f32("projector roll")?;
    let position = r.vec3("projector position")?;
    let fallback = (
        r.u32("projector fallback width")?,
        r.u32("projector fallback height")?,
    );

    let screen = if r.bool("projector screen flag")? {
        let id = r.string("screen id")?;
        let rect = ScreenRect::new(
            r.i32("screen x")?,
            r.i32("screen y")?,
            r.u32("screen width")?,
            r.u32("screen height")?,
        );
        let sub_screens = r.u32("screen sub-screen count")?;
        Some(ScreenInfo::tiled(id, rect, sub_screens))
    } else {
        None
    };
    let sub_screen_index = r.u32("projector sub-screen index")?;

    let mut projector = Projector::new(fallback);
    projector.set_fov(fov);
    projector.set_keystone(keystone);
    projector.set_pose(yaw, pitch, roll, position);
    projector
        .set_screen(screen, sub_screen_index)
        .map_err(|_| StreamError::InvalidTag {
            field: "projector sub-screen index",
            value: sub_screen_index,
        })?;
    Ok(projector)
}

pub(crate) fn write_warp_grid(buf: &mut impl BufMut, grid: &WarpGrid) {
    buf.put_u32(grid.columns() as u32);
    buf.put_u32(grid.rows() as u32);
    buf.put_u8(grid.interpolation().tag());
    for point in grid.points() {
        buf.put_f32(point.pos.x);
        buf.put_f32(point.pos.y);
        put_bool(buf, point.selected);
    }
}

pub(crate) fn read_warp_grid(r: &mut Reader) -> Result<WarpGrid, StreamError> {
    let columns = r.u32("warp columns")? as usize;
    let rows = r.u32("warp rows")? as usize;
    let tag = r.u8("warp interpolation")?;
    let interpolation = WarpInterpolation::from_tag(tag).ok_or(StreamError::InvalidTag {
        field: "warp interpolation",
        value: tag as u32,
    })?;

    // 2 floats + 1 flag per point; checked up front so a bogus count cannot allocate
    let count = columns.saturating_mul(rows);
    r.need("warp points", count.saturating_mul(9))?;
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let pos = r.vec2("warp point")?;
        let selected = r.bool("warp point selection")?;
        points.push(WarpPoint { pos, selected });
    }

    let mut grid = WarpGrid::from_points(columns, rows, points).ok_or(StreamError::InvalidTag {
        field: "warp points",
        value: count as u32,
    })?;
    grid.set_interpolation(interpolation);
    Ok(grid)
}

pub(crate) fn write_blend_mask(buf: &mut impl BufMut, mask: &BlendMask) {
    buf.put_f32(mask.top_width());
    buf.put_f32(mask.bottom_width());
    buf.put_f32(mask.left_width());
    buf.put_f32(mask.right_width());
    buf.put_f32(mask.gamma());

    let brush = mask.brush();
    buf.put_f32(brush.radius());
    buf.put_f32(brush.feather());
    buf.put_f32(brush.opacity());
    put_bool(buf, brush.invert());

    let strokes = mask.strokes();
    buf.put_u32(strokes.width());
    buf.put_u32(strokes.height());
    let compressed = lz4_flex::compress(strokes.as_raw());
    buf.put_u32(compressed.len() as u32);
    buf.put_slice(&compressed);
}

pub(crate) fn read_blend_mask(r: &mut Reader) -> Result<BlendMask, StreamError> {
    let top = r.f32("blend top width")?;
    let bottom = r.f32("blend bottom width")?;
    let left = r.f32("blend left width")?;
    let right = r.f32("blend right width")?;
    let gamma = r.f32("blend gamma")?;

    let mut brush = Brush::new(r.f32("brush radius")?);
    brush.set_feather(r.f32("brush feather")?);
    brush.set_opacity(r.f32("brush opacity")?);
    brush.set_invert(r.bool("brush invert")?);

    let width = r.u32("mask width")?;
    let height = r.u32("mask height")?;
    let compressed_len = r.u32("mask data length")? as usize;
    let compressed = r.bytes("mask data", compressed_len)?;

    let pixels = width as u64 * height as u64;
    if pixels > MAX_MASK_PIXELS {
        return Err(StreamError::MaskRaster(format!(
            "{}x{} exceeds the maximum raster size",
            width, height
        )));
    }
    let raw = lz4_flex::decompress(compressed, pixels as usize)
        .map_err(|e| StreamError::MaskRaster(format!("LZ4 decompression failed: {}", e)))?;
    if raw.len() as u64 != pixels {
        return Err(StreamError::MaskRaster(format!(
            "expected {} bytes for {}x{}, got {}",
            pixels,
            width,
            height,
            raw.len()
        )));
    }
    let strokes = StrokeBuffer::from_raw(width, height, raw)
        .ok_or_else(|| StreamError::MaskRaster(format!("invalid raster {}x{}", width, height)))?;

    let mut mask = BlendMask::new(width, height);
    mask.set_edges(top, bottom, left, right);
    mask.set_gamma(gamma);
    mask.set_brush(brush);
    mask.set_strokes(strokes);
    Ok(mask)
}

/// Fixed field order: color, projector, warp grid, blend mask
pub(crate) fn write_fields(buf: &mut impl BufMut, tuning: &Tuning) {
    write_color(buf, tuning.color());
    write_projector(buf, tuning.projector());
    write_warp_grid(buf, tuning.warp_grid());
    write_blend_mask(buf, tuning.blend_mask());
}

pub(crate) fn read_fields(r: &mut Reader) -> Result<Tuning, StreamError> {
    let color = read_color(r)?;
    let projector = read_projector(r)?;
    let warp_grid = read_warp_grid(r)?;
    let blend_mask = read_blend_mask(r)?;
    Ok(Tuning::from_parts(color, projector, warp_grid, blend_mask))
}
