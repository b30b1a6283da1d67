//! 8×8 Morton-order tile swizzle.
//!
//! The console's texture unit stores images in 8×8 tiles whose pixels follow
//! a Z-order curve (x bit least significant). Packing reorders a row-major
//! alpha buffer so that a linear scan of each tile region yields the curve
//! order; unpacking is the exact inverse. Width and height must be multiples
//! of 8, which sheet dimensions always are.

use image::GrayImage;

/// Z-order index of `(x, y)` within an 8×8 tile: x₀ y₀ x₁ y₁ x₂ y₂ from the
/// least significant bit up.
fn morton(x: u32, y: u32) -> u32 {
    let mut index = 0;
    for bit in 0..3 {
        index |= ((x >> bit) & 1) << (2 * bit);
        index |= ((y >> bit) & 1) << (2 * bit + 1);
    }
    index
}

/// Reorder `img` between row-major and tiled layouts.
///
/// With `unswizzle == false`, pixel `(x, y)` of each tile moves to the slot
/// a row-major scan visits at its Morton index; with `unswizzle == true` the
/// permutation is inverted. Applying one after the other is the identity.
pub fn swizzle(img: &GrayImage, unswizzle: bool) -> GrayImage {
    debug_assert!(img.width() % 8 == 0 && img.height() % 8 == 0);

    let mut out = GrayImage::new(img.width(), img.height());
    for tile_y in (0..img.height()).step_by(8) {
        for tile_x in (0..img.width()).step_by(8) {
            for y in 0..8 {
                for x in 0..8 {
                    let index = morton(x, y);
                    let (sx, sy) = (index % 8, index / 8);
                    let (src, dst) = if unswizzle {
                        ((sx, sy), (x, y))
                    } else {
                        ((x, y), (sx, sy))
                    };
                    let pixel = *img.get_pixel(tile_x + src.0, tile_y + src.1);
                    out.put_pixel(tile_x + dst.0, tile_y + dst.1, pixel);
                }
            }
        }
    }
    out
}
