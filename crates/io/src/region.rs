//! Binary segmentation masks stored as NIfTI-1 volumes.

use std::path::Path;

use glam::{Mat4, Vec3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use tracing::debug;

use crate::error::IoError;

/// A 3D boolean mask on a voxel grid, with its voxel-to-world affine.
///
/// Voxels are stored x-fastest: index = x + dims[0] * (y + dims[1] * z).
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    dims: [usize; 3],
    inside: Vec<bool>,
    pub affine: Mat4,
}

impl RegionMask {
    /// Build a mask from x-fastest voxel flags. Returns `None` when the
    /// number of flags does not match the grid.
    pub fn new(dims: [usize; 3], inside: Vec<bool>, affine: Mat4) -> Option<Self> {
        (dims.iter().product::<usize>() == inside.len()).then_some(Self {
            dims,
            inside,
            affine,
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    /// Whether the voxel at signed grid coordinates is set. Coordinates off
    /// the grid are outside.
    pub fn is_inside(&self, x: i64, y: i64, z: i64) -> bool {
        let [dx, dy, dz] = self.dims;
        if x < 0 || y < 0 || z < 0 {
            return false;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        if x >= dx || y >= dy || z >= dz {
            return false;
        }
        self.inside[self.index(x, y, z)]
    }

    /// Number of voxels inside the region.
    pub fn voxel_count(&self) -> usize {
        self.inside.iter().filter(|v| **v).count()
    }

    /// Centres of the boundary voxels in voxel index coordinates.
    ///
    /// A voxel is on the boundary when it is inside and at least one of its
    /// six face neighbours is outside or off the grid.
    pub fn surface_points(&self) -> Vec<Vec3> {
        const NEIGHBOURS: [(i64, i64, i64); 6] = [
            (1, 0, 0),
            (-1, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (0, 0, 1),
            (0, 0, -1),
        ];

        let [dx, dy, dz] = self.dims;
        let mut points = Vec::new();
        for z in 0..dz {
            for y in 0..dy {
                for x in 0..dx {
                    if !self.inside[self.index(x, y, z)] {
                        continue;
                    }
                    let (xi, yi, zi) = (x as i64, y as i64, z as i64);
                    let boundary = NEIGHBOURS
                        .iter()
                        .any(|(ox, oy, oz)| !self.is_inside(xi + ox, yi + oy, zi + oz));
                    if boundary {
                        points.push(Vec3::new(x as f32, y as f32, z as f32));
                    }
                }
            }
        }
        points
    }
}

/// Read a NIfTI-1 volume (`.nii` or `.nii.gz`) as a mask. Non-zero voxels are
/// inside.
///
/// The affine comes from the sform rows when `sform_code > 0`, otherwise from
/// the voxel sizes alone.
pub fn read(path: impl AsRef<Path>) -> Result<RegionMask, IoError> {
    let path = path.as_ref();
    let obj = ReaderOptions::new().read_file(path)?;
    let header = obj.header();

    let ndim = header.dim[0] as usize;
    if ndim != 3 {
        return Err(IoError::Dimensionality(ndim));
    }
    let dims = [
        header.dim[1] as usize,
        header.dim[2] as usize,
        header.dim[3] as usize,
    ];

    let affine = if header.sform_code > 0 {
        Mat4::from_cols_array_2d(&[header.srow_x, header.srow_y, header.srow_z, [0.0, 0.0, 0.0, 1.0]])
            .transpose()
    } else {
        Mat4::from_scale(Vec3::new(header.pixdim[1], header.pixdim[2], header.pixdim[3]))
    };

    let volume = obj.into_volume().into_ndarray::<f32>()?;
    let mut inside = vec![false; dims.iter().product()];
    for (index, value) in volume.indexed_iter() {
        if *value != 0.0 {
            inside[index[0] + dims[0] * (index[1] + dims[1] * index[2])] = true;
        }
    }

    let mask = RegionMask {
        dims,
        inside,
        affine,
    };
    debug!(
        path = %path.display(),
        ?dims,
        voxels = mask.voxel_count(),
        "read region mask"
    );
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Minimal single-file NIfTI-1 with uint8 voxels.
    fn nifti_bytes(dims: &[u16], voxels: &[u8], srow: Option<[[f32; 4]; 3]>) -> Vec<u8> {
        let mut out = vec![0u8; 352];
        out[0..4].copy_from_slice(&348i32.to_le_bytes());
        let mut dim = [1i16; 8];
        dim[0] = dims.len() as i16;
        for (slot, d) in dim[1..].iter_mut().zip(dims) {
            *slot = *d as i16;
        }
        for (i, d) in dim.iter().enumerate() {
            out[40 + 2 * i..42 + 2 * i].copy_from_slice(&d.to_le_bytes());
        }
        out[70..72].copy_from_slice(&2i16.to_le_bytes());
        out[72..74].copy_from_slice(&8i16.to_le_bytes());
        let pixdim = [1.0f32, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0];
        for (i, p) in pixdim.iter().enumerate() {
            out[76 + 4 * i..80 + 4 * i].copy_from_slice(&p.to_le_bytes());
        }
        out[108..112].copy_from_slice(&352.0f32.to_le_bytes());
        out[112..116].copy_from_slice(&1.0f32.to_le_bytes());
        if let Some(rows) = srow {
            out[254..256].copy_from_slice(&1i16.to_le_bytes());
            for (r, row) in rows.iter().enumerate() {
                for (c, v) in row.iter().enumerate() {
                    let at = 280 + 16 * r + 4 * c;
                    out[at..at + 4].copy_from_slice(&v.to_le_bytes());
                }
            }
        }
        out[344..348].copy_from_slice(b"n+1\0");
        out.extend_from_slice(voxels);
        out
    }

    fn write_nii(bytes: &[u8]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("mask.nii")).unwrap();
        f.write_all(bytes).unwrap();
        dir
    }

    fn cube(n: usize, lo: usize, hi: usize) -> Vec<bool> {
        let mut v = vec![false; n * n * n];
        for z in lo..hi {
            for y in lo..hi {
                for x in lo..hi {
                    v[x + n * (y + n * z)] = true;
                }
            }
        }
        v
    }

    #[test]
    fn new_rejects_wrong_length() {
        assert!(RegionMask::new([2, 2, 2], vec![true; 7], Mat4::IDENTITY).is_none());
        assert!(RegionMask::new([2, 2, 2], vec![true; 8], Mat4::IDENTITY).is_some());
    }

    #[test]
    fn off_grid_is_outside() {
        let mask = RegionMask::new([2, 2, 2], vec![true; 8], Mat4::IDENTITY).unwrap();
        assert!(mask.is_inside(1, 1, 1));
        assert!(!mask.is_inside(-1, 0, 0));
        assert!(!mask.is_inside(0, 2, 0));
    }

    #[test]
    fn solid_cube_surface_excludes_interior() {
        let mask = RegionMask::new([5, 5, 5], cube(5, 1, 4), Mat4::IDENTITY).unwrap();
        assert_eq!(mask.voxel_count(), 27);
        let surface = mask.surface_points();
        // 3x3x3 cube: everything but the centre voxel touches outside.
        assert_eq!(surface.len(), 26);
        assert!(!surface.contains(&Vec3::splat(2.0)));
    }

    #[test]
    fn full_grid_boundary_is_its_shell() {
        let mask = RegionMask::new([3, 3, 3], vec![true; 27], Mat4::IDENTITY).unwrap();
        assert_eq!(mask.surface_points().len(), 26);
    }

    #[test]
    fn empty_mask_has_no_surface() {
        let mask = RegionMask::new([3, 3, 3], vec![false; 27], Mat4::IDENTITY).unwrap();
        assert!(mask.surface_points().is_empty());
    }

    #[test]
    fn reads_mask_with_pixdim_affine() {
        let flags = cube(4, 1, 3);
        let voxels: Vec<u8> = flags.iter().map(|b| u8::from(*b)).collect();
        let dir = write_nii(&nifti_bytes(&[4, 4, 4], &voxels, None));

        let mask = read(dir.path().join("mask.nii")).unwrap();
        assert_eq!(mask.dims(), [4, 4, 4]);
        assert_eq!(mask.voxel_count(), 8);
        assert!(mask.is_inside(1, 2, 1));
        assert!(!mask.is_inside(0, 0, 0));
        assert_eq!(mask.affine, Mat4::from_scale(Vec3::splat(2.0)));
    }

    #[test]
    fn reads_sform_affine() {
        let rows = [
            [-2.0, 0.0, 0.0, 90.0],
            [0.0, 2.0, 0.0, -126.0],
            [0.0, 0.0, 2.0, -72.0],
        ];
        let dir = write_nii(&nifti_bytes(&[2, 2, 2], &[1, 0, 0, 0, 0, 0, 0, 1], Some(rows)));

        let mask = read(dir.path().join("mask.nii")).unwrap();
        let world = mask.affine.transform_point3(Vec3::new(1.0, 1.0, 1.0));
        assert!(world.abs_diff_eq(Vec3::new(88.0, -124.0, -70.0), 1e-5));
        assert!(mask.is_inside(0, 0, 0));
        assert!(mask.is_inside(1, 1, 1));
        assert_eq!(mask.voxel_count(), 2);
    }

    #[test]
    fn rejects_4d_volume() {
        let dir = write_nii(&nifti_bytes(&[2, 2, 2, 2], &[0; 16], None));
        let err = read(dir.path().join("mask.nii")).unwrap_err();
        assert!(matches!(err, IoError::Dimensionality(4)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read(dir.path().join("absent.nii")).is_err());
    }
}
