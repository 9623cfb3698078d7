//! TrackVis `.trk` tractograms.
//!
//! Layout: a 1000-byte header followed by one record per streamline:
//! `n_points: i32`, then `n_points * (3 + n_scalars)` floats, then
//! `n_properties` floats. Point coordinates are "voxmm": voxel-corner
//! coordinates scaled by the voxel size. Byte order is detected from the
//! `hdr_size` field, which must read as 1000.

use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Mat4, Vec3, Vec4};
use tractscope_common::{Streamline, Tractogram, flatten_points};

use crate::error::IoError;

const HEADER_SIZE: usize = 1000;
const MAGIC: &[u8; 6] = b"TRACK\0";

/// Upper bound on capacity reserved from counts read out of the file.
const MAX_PREALLOCATION: usize = 1 << 16;

const OFFSET_DIM: usize = 6;
const OFFSET_VOXEL_SIZE: usize = 12;
const OFFSET_N_SCALARS: usize = 36;
const OFFSET_N_PROPERTIES: usize = 238;
const OFFSET_VOX_TO_RAS: usize = 440;
const OFFSET_VOXEL_ORDER: usize = 948;
const OFFSET_N_COUNT: usize = 988;
const OFFSET_VERSION: usize = 992;
const OFFSET_HDR_SIZE: usize = 996;

/// Header fields needed to interpret the streamline records.
#[derive(Debug, Clone, PartialEq)]
pub struct TrkHeader {
    pub dim: [i16; 3],
    pub voxel_size: Vec3,
    pub n_scalars: usize,
    pub n_properties: usize,
    pub vox_to_ras: Mat4,
    pub voxel_order: [u8; 3],
    /// Declared streamline count; zero means "read until end of file".
    pub n_count: usize,
    pub version: i32,
}

impl TrkHeader {
    /// Map from voxmm coordinates to RAS+ mm.
    ///
    /// voxmm is divided by the voxel size, shifted by half a voxel so that
    /// integer coordinates are voxel centres, flipped on axes stored as
    /// L/P/I, and finally mapped through `vox_to_ras`.
    fn voxmm_to_rasmm(&self) -> Result<Mat4, IoError> {
        let mut to_vox = Mat4::from_scale(self.voxel_size.recip());
        to_vox = Mat4::from_translation(Vec3::splat(-0.5)) * to_vox;

        let mut flip = Mat4::IDENTITY;
        for (axis, letter) in self.voxel_order.iter().enumerate() {
            let expected = [b'R', b'A', b'S'][axis];
            let opposite = [b'L', b'P', b'I'][axis];
            let letter = letter.to_ascii_uppercase();
            if letter == opposite {
                let extent = (self.dim[axis].max(1) - 1) as f32;
                let mut col = Vec4::ZERO;
                col[axis] = -1.0;
                *flip.col_mut(axis) = col;
                flip.col_mut(3)[axis] = extent;
            } else if letter != expected {
                return Err(IoError::InvalidHeader(format!(
                    "unsupported voxel order {:?}",
                    String::from_utf8_lossy(&self.voxel_order)
                )));
            }
        }

        Ok(self.vox_to_ras * flip * to_vox)
    }
}

/// Byte order of a file, detected from `hdr_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

fn detect_byte_order(data: &[u8]) -> Result<Endian, IoError> {
    if data.len() < HEADER_SIZE {
        return Err(IoError::Truncated { offset: data.len() });
    }
    let raw = &data[OFFSET_HDR_SIZE..HEADER_SIZE];
    if LittleEndian::read_i32(raw) == HEADER_SIZE as i32 {
        Ok(Endian::Little)
    } else if BigEndian::read_i32(raw) == HEADER_SIZE as i32 {
        Ok(Endian::Big)
    } else {
        Err(IoError::InvalidHeader(format!(
            "hdr_size is {}, expected {HEADER_SIZE}",
            LittleEndian::read_i32(raw)
        )))
    }
}

/// Map a short read at `offset` to `Truncated`.
fn short_read(offset: u64) -> impl FnOnce(io::Error) -> IoError {
    move |err| match err.kind() {
        io::ErrorKind::UnexpectedEof => IoError::Truncated {
            offset: offset as usize,
        },
        _ => IoError::Io(err),
    }
}

/// Parse the header. `data` holds at least `HEADER_SIZE` bytes.
fn parse_header<B: ByteOrder>(data: &[u8]) -> Result<TrkHeader, IoError> {
    let mut cur = Cursor::new(data);

    let mut magic = [0u8; 6];
    cur.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(IoError::InvalidHeader("missing TRACK magic".into()));
    }

    let mut dim = [0i16; 3];
    cur.set_position(OFFSET_DIM as u64);
    cur.read_i16_into::<B>(&mut dim)?;

    let mut size = [0f32; 3];
    cur.set_position(OFFSET_VOXEL_SIZE as u64);
    cur.read_f32_into::<B>(&mut size)?;
    let voxel_size = Vec3::from_array(size);
    if voxel_size.cmple(Vec3::ZERO).any() {
        return Err(IoError::InvalidHeader(format!(
            "non-positive voxel size {voxel_size}"
        )));
    }

    cur.set_position(OFFSET_N_SCALARS as u64);
    let n_scalars = non_negative(cur.read_i16::<B>()? as i32, "n_scalars")?;
    cur.set_position(OFFSET_N_PROPERTIES as u64);
    let n_properties = non_negative(cur.read_i16::<B>()? as i32, "n_properties")?;

    // Stored row-major.
    let mut rows = [0f32; 16];
    cur.set_position(OFFSET_VOX_TO_RAS as u64);
    cur.read_f32_into::<B>(&mut rows)?;
    let mut vox_to_ras = Mat4::from_cols_array(&rows).transpose();
    if vox_to_ras.w_axis.w == 0.0 {
        // Version 1 files leave the matrix empty.
        vox_to_ras = Mat4::from_scale(voxel_size);
    }

    let mut order = [0u8; 4];
    cur.set_position(OFFSET_VOXEL_ORDER as u64);
    cur.read_exact(&mut order)?;
    let voxel_order = if order[0] == 0 {
        *b"RAS"
    } else {
        [order[0], order[1], order[2]]
    };

    cur.set_position(OFFSET_N_COUNT as u64);
    let n_count = non_negative(cur.read_i32::<B>()?, "n_count")?;
    cur.set_position(OFFSET_VERSION as u64);
    let version = cur.read_i32::<B>()?;

    Ok(TrkHeader {
        dim,
        voxel_size,
        n_scalars,
        n_properties,
        vox_to_ras,
        voxel_order,
        n_count,
        version,
    })
}

fn non_negative(value: i32, field: &str) -> Result<usize, IoError> {
    usize::try_from(value)
        .map_err(|_| IoError::InvalidHeader(format!("negative {field}: {value}")))
}

fn header_from(data: &[u8]) -> Result<TrkHeader, IoError> {
    match detect_byte_order(data)? {
        Endian::Little => parse_header::<LittleEndian>(data),
        Endian::Big => parse_header::<BigEndian>(data),
    }
}

/// Read the header only.
pub fn read_header(path: impl AsRef<Path>) -> Result<TrkHeader, IoError> {
    let data = std::fs::read(path.as_ref())?;
    header_from(&data)
}

/// Read a tractogram. Streamlines are returned in RAS+ mm; the tractogram's
/// affine is the header's `vox_to_ras`.
pub fn read(path: impl AsRef<Path>) -> Result<Tractogram, IoError> {
    let path = path.as_ref();
    let _span = tracing::info_span!("trk_read", path = %path.display()).entered();

    let data = std::fs::read(path)?;
    let (header, streamlines) = match detect_byte_order(&data)? {
        Endian::Little => decode::<LittleEndian>(&data)?,
        Endian::Big => decode::<BigEndian>(&data)?,
    };

    tracing::info!(
        streamlines = streamlines.len(),
        version = header.version,
        "tractogram loaded"
    );

    Ok(Tractogram::new(streamlines, header.vox_to_ras))
}

fn decode<B: ByteOrder>(data: &[u8]) -> Result<(TrkHeader, Vec<Streamline>), IoError> {
    let header = parse_header::<B>(data)?;
    let to_rasmm = header.voxmm_to_rasmm()?;
    let streamlines = read_records::<B>(data, &header, &to_rasmm)?;
    Ok((header, streamlines))
}

fn read_records<B: ByteOrder>(
    data: &[u8],
    header: &TrkHeader,
    to_rasmm: &Mat4,
) -> Result<Vec<Streamline>, IoError> {
    let floats_per_point = 3 + header.n_scalars;
    let len = data.len() as u64;
    let mut cur = Cursor::new(data);
    cur.set_position(HEADER_SIZE as u64);
    let mut streamlines = Vec::with_capacity(header.n_count.min(MAX_PREALLOCATION));

    while cur.position() < len && (header.n_count == 0 || streamlines.len() < header.n_count) {
        let start = cur.position();
        let n_points = cur.read_i32::<B>().map_err(short_read(start))?;
        let n_points = non_negative(n_points, "point count")?;

        let n_floats = n_points * floats_per_point + header.n_properties;
        let remaining = len - cur.position();
        if (4 * n_floats) as u64 > remaining {
            return Err(IoError::Truncated { offset: data.len() });
        }
        let at = cur.position();
        let mut floats = vec![0f32; n_floats];
        cur.read_f32_into::<B>(&mut floats).map_err(short_read(at))?;

        let points = floats[..n_points * floats_per_point]
            .chunks_exact(floats_per_point)
            .map(|f| to_rasmm.transform_point3(Vec3::new(f[0], f[1], f[2])))
            .collect();
        streamlines.push(Streamline::new(points));
    }

    if header.n_count != 0 && streamlines.len() != header.n_count {
        return Err(IoError::Truncated {
            offset: cur.position() as usize,
        });
    }
    Ok(streamlines)
}

/// Write a tractogram as a little-endian version 2 `.trk` file in RAS voxel
/// order. Voxel sizes come from the affine's column lengths; the grid
/// dimensions cover every point.
pub fn write(path: impl AsRef<Path>, tractogram: &Tractogram) -> Result<(), IoError> {
    let affine = tractogram.affine;
    let voxel_size = Vec3::new(
        affine.x_axis.truncate().length(),
        affine.y_axis.truncate().length(),
        affine.z_axis.truncate().length(),
    );
    if voxel_size.cmple(Vec3::ZERO).any() {
        return Err(IoError::InvalidHeader(format!(
            "affine has degenerate voxel size {voxel_size}"
        )));
    }

    let voxel = tractogram.to_voxel_space();
    let extent = upper_voxel_extent(&voxel);
    let n_count = i32::try_from(voxel.len())
        .map_err(|_| IoError::InvalidHeader("too many streamlines".into()))?;

    let mut out = Cursor::new(vec![0u8; HEADER_SIZE]);
    out.write_all(MAGIC)?;
    out.set_position(OFFSET_DIM as u64);
    for e in extent {
        out.write_i16::<LittleEndian>(e.clamp(1, i16::MAX as i32) as i16)?;
    }
    for v in voxel_size.to_array() {
        out.write_f32::<LittleEndian>(v)?;
    }
    out.set_position(OFFSET_VOX_TO_RAS as u64);
    for v in affine.transpose().to_cols_array() {
        out.write_f32::<LittleEndian>(v)?;
    }
    out.set_position(OFFSET_VOXEL_ORDER as u64);
    out.write_all(b"RAS\0")?;
    out.set_position(OFFSET_N_COUNT as u64);
    out.write_i32::<LittleEndian>(n_count)?;
    out.set_position(OFFSET_VERSION as u64);
    out.write_i32::<LittleEndian>(2)?;
    out.set_position(OFFSET_HDR_SIZE as u64);
    out.write_i32::<LittleEndian>(HEADER_SIZE as i32)?;

    let mut out = out.into_inner();
    for streamline in &voxel {
        let n_points = i32::try_from(streamline.len())
            .map_err(|_| IoError::InvalidHeader("streamline too long".into()))?;
        out.write_i32::<LittleEndian>(n_points)?;
        for p in streamline.points() {
            let voxmm = (*p + Vec3::splat(0.5)) * voxel_size;
            for c in voxmm.to_array() {
                out.write_f32::<LittleEndian>(c)?;
            }
        }
    }

    std::fs::write(path.as_ref(), out)?;
    tracing::debug!(
        path = %path.as_ref().display(),
        streamlines = voxel.len(),
        "tractogram written"
    );
    Ok(())
}

/// Smallest grid size (per axis) containing every voxel coordinate.
fn upper_voxel_extent(voxel: &[Streamline]) -> [i32; 3] {
    let mut extent = [1i32; 3];
    for p in flatten_points(voxel) {
        for (axis, e) in extent.iter_mut().enumerate() {
            let needed = p[axis].ceil() as i32 + 1;
            *e = (*e).max(needed);
        }
    }
    extent
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch_i16(data: &mut [u8], offset: usize, v: i16) {
        LittleEndian::write_i16(&mut data[offset..], v);
    }

    fn patch_i32(data: &mut [u8], offset: usize, v: i32) {
        LittleEndian::write_i32(&mut data[offset..], v);
    }

    fn append_f32s(data: &mut Vec<u8>, values: &[f32]) {
        for v in values {
            data.write_f32::<LittleEndian>(*v).unwrap();
        }
    }

    fn sample() -> Tractogram {
        let affine = Mat4::from_cols(
            Vec4::new(2.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 2.5, 0.0),
            Vec4::new(-90.0, -126.0, -72.0, 1.0),
        );
        let voxel_lines = vec![
            Streamline::new(vec![
                Vec3::new(10.0, 20.0, 5.0),
                Vec3::new(11.0, 21.5, 6.0),
                Vec3::new(12.0, 23.0, 7.25),
            ]),
            Streamline::new(vec![Vec3::new(40.0, 1.0, 2.0), Vec3::new(41.0, 1.0, 2.0)]),
        ];
        let world = voxel_lines.iter().map(|s| s.transformed(&affine)).collect();
        Tractogram::new(world, affine)
    }

    fn assert_same_geometry(a: &Tractogram, b: &Tractogram) {
        assert_eq!(a.len(), b.len());
        for (sa, sb) in a.streamlines.iter().zip(&b.streamlines) {
            assert_eq!(sa.len(), sb.len());
            for (pa, pb) in sa.points().iter().zip(sb.points()) {
                assert!(pa.abs_diff_eq(*pb, 1e-3), "{pa} != {pb}");
            }
        }
    }

    #[test]
    fn write_then_read_preserves_world_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.trk");
        let original = sample();

        write(&path, &original).unwrap();
        let loaded = read(&path).unwrap();

        assert_same_geometry(&original, &loaded);
        assert!(loaded.affine.abs_diff_eq(original.affine, 1e-6));
    }

    #[test]
    fn header_reports_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.trk");
        write(&path, &sample()).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.n_count, 2);
        assert_eq!(header.version, 2);
        assert_eq!(header.voxel_order, *b"RAS");
        assert!(header.voxel_size.abs_diff_eq(Vec3::new(2.0, 2.0, 2.5), 1e-6));
        assert!(header.dim[0] >= 42);
    }

    #[test]
    fn big_endian_files_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let le_path = dir.path().join("le.trk");
        write(&le_path, &sample()).unwrap();
        let le = std::fs::read(&le_path).unwrap();

        // Byte-swap every numeric field we produced.
        fn swap(buf: &mut [u8], offset: usize, width: usize) {
            buf[offset..offset + width].reverse();
        }
        let mut be = le.clone();
        for axis in 0..3 {
            swap(&mut be, OFFSET_DIM + 2 * axis, 2);
            swap(&mut be, OFFSET_VOXEL_SIZE + 4 * axis, 4);
        }
        for i in 0..16 {
            swap(&mut be, OFFSET_VOX_TO_RAS + 4 * i, 4);
        }
        for offset in [OFFSET_N_COUNT, OFFSET_VERSION, OFFSET_HDR_SIZE] {
            swap(&mut be, offset, 4);
        }
        let mut offset = HEADER_SIZE;
        while offset < be.len() {
            let n = LittleEndian::read_i32(&le[offset..]) as usize;
            swap(&mut be, offset, 4);
            offset += 4;
            for _ in 0..n * 3 {
                swap(&mut be, offset, 4);
                offset += 4;
            }
        }

        let be_path = dir.path().join("be.trk");
        std::fs::write(&be_path, be).unwrap();
        assert_same_geometry(&read(&le_path).unwrap(), &read(&be_path).unwrap());
    }

    #[test]
    fn scalars_and_properties_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalars.trk");
        write(&path, &Tractogram::new(vec![], Mat4::IDENTITY)).unwrap();

        let mut data = std::fs::read(&path).unwrap();
        patch_i16(&mut data, OFFSET_N_SCALARS, 1);
        patch_i16(&mut data, OFFSET_N_PROPERTIES, 2);
        patch_i32(&mut data, OFFSET_N_COUNT, 1);
        data.write_i32::<LittleEndian>(2).unwrap();
        append_f32s(&mut data, &[0.5, 0.5, 0.5, 9.0, 1.5, 0.5, 0.5, 9.0, 7.0, 7.0]);
        std::fs::write(&path, data).unwrap();

        let t = read(&path).unwrap();
        assert_eq!(t.len(), 1);
        let pts = t.streamlines[0].points();
        assert!(pts[0].abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(pts[1].abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn flipped_voxel_order_mirrors_axis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lps.trk");
        write(&path, &Tractogram::new(vec![], Mat4::IDENTITY)).unwrap();

        let mut data = std::fs::read(&path).unwrap();
        patch_i16(&mut data, OFFSET_DIM, 10);
        data[OFFSET_VOXEL_ORDER..OFFSET_VOXEL_ORDER + 4].copy_from_slice(b"LAS\0");
        patch_i32(&mut data, OFFSET_N_COUNT, 1);
        data.write_i32::<LittleEndian>(1).unwrap();
        append_f32s(&mut data, &[2.5, 0.5, 0.5]);
        std::fs::write(&path, data).unwrap();

        let t = read(&path).unwrap();
        // Voxel 2 of 10 on a flipped axis is voxel 7 in RAS order.
        assert!(t.streamlines[0].points()[0].abs_diff_eq(Vec3::new(7.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn rejects_missing_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.trk");
        let mut data = vec![0u8; HEADER_SIZE];
        patch_i32(&mut data, OFFSET_HDR_SIZE, 1000);
        std::fs::write(&path, data).unwrap();
        assert!(matches!(read(&path), Err(IoError::InvalidHeader(_))));
    }

    #[test]
    fn rejects_bad_header_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.trk");
        std::fs::write(&path, vec![0u8; HEADER_SIZE]).unwrap();
        assert!(matches!(read(&path), Err(IoError::InvalidHeader(_))));
    }

    #[test]
    fn truncated_body_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.trk");
        write(&path, &sample()).unwrap();
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 6]).unwrap();
        assert!(matches!(read(&path), Err(IoError::Truncated { .. })));
    }

    #[test]
    fn short_header_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stub.trk");
        std::fs::write(&path, b"TRACK\0").unwrap();
        assert!(matches!(
            read_header(&path),
            Err(IoError::Truncated { offset: 6 })
        ));
    }

    #[test]
    fn record_cut_inside_point_count_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.trk");
        write(&path, &Tractogram::new(vec![], Mat4::IDENTITY)).unwrap();

        let mut data = std::fs::read(&path).unwrap();
        data.extend_from_slice(&[3, 0]);
        std::fs::write(&path, data).unwrap();

        assert!(matches!(
            read(&path),
            Err(IoError::Truncated { offset }) if offset == HEADER_SIZE
        ));
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        assert!(matches!(
            read("/nonexistent/definitely/missing.trk"),
            Err(IoError::Io(_))
        ));
    }
}
