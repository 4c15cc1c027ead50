use crate::errors::ArscError;
use crate::model::FlagRegion;

/// The "declared public" bit inside a spec configuration mask
/// (`0x40000000`, so bit 6 of the word's high byte).
const PUBLIC_FLAG_BYTE: u8 = 0x40;
/// Little-endian offset of the high byte within each u32 flag word.
const HIGH_BYTE: usize = 3;

/// Toggle the public bit on across every entry-flag word of the given
/// regions, in place. Idempotent; bytes outside the regions are untouched.
///
/// `regions` are the `(offset, count)` flag runs the decoder surfaced from
/// each type-spec chunk; `offset` addresses the first u32 of the run.
pub fn publicize(data: &mut [u8], regions: &[FlagRegion]) -> Result<(), ArscError> {
    for region in regions {
        let end = region
            .offset
            .checked_add(region.count * 4)
            .filter(|&end| end <= data.len())
            .ok_or(ArscError::TruncatedChunk {
                offset: region.offset,
                declared: (region.count * 4) as u32,
                available: data.len(),
            })?;

        let mut at = region.offset + HIGH_BYTE;
        while at < end {
            data[at] |= PUBLIC_FLAG_BYTE;
            at += 4;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::session::DecodeOptions;
    use crate::testutil::{ArscBuilder, text};

    #[test]
    fn sets_public_bit_and_is_idempotent() {
        let mut data = vec![0u8; 0x200];
        data[0x103] = 0x01; // pre-existing high-byte bits survive
        let before = data.clone();
        let regions = [FlagRegion {
            offset: 0x100,
            count: 3,
        }];

        publicize(&mut data, &regions).unwrap();
        assert_eq!(data[0x103], before[0x103] | 0x40);
        assert_eq!(data[0x107], 0x40);
        assert_eq!(data[0x10b], 0x40);

        // untouched outside the patched bytes
        for (i, (&b, &a)) in before.iter().zip(data.iter()).enumerate() {
            if ![0x103, 0x107, 0x10b].contains(&i) {
                assert_eq!(b, a, "byte 0x{:x} changed", i);
            }
        }

        let once = data.clone();
        publicize(&mut data, &regions).unwrap();
        assert_eq!(data, once);
    }

    #[test]
    fn region_past_the_input_is_an_error() {
        let mut data = vec![0u8; 16];
        let regions = [FlagRegion {
            offset: 8,
            count: 4,
        }];
        assert!(matches!(
            publicize(&mut data, &regions),
            Err(ArscError::TruncatedChunk { .. })
        ));
    }

    #[test]
    fn decoded_regions_publicize_a_real_table() {
        let mut arsc = ArscBuilder::new()
            .package(0x7f, "com.example", |p| {
                p.simple_type("string", &[("app_name", text("Hello")), ("other", text("x"))]);
            })
            .build();

        let decoder = Decoder::new(DecodeOptions::default());
        let table = decoder.decode(&arsc).unwrap();
        let regions = table.flag_regions();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].count, 2);

        publicize(&mut arsc, &regions).unwrap();

        // every spec flag word now carries the public bit; the table still
        // decodes and the entry flags are unaffected
        let reparsed = decoder.decode(&arsc).unwrap();
        let package = reparsed.main_package().unwrap();
        let type_spec = package.type_spec(1).unwrap();
        for flags in &type_spec.flags {
            assert_ne!(flags & 0x4000_0000, 0);
        }

        let spec = type_spec.spec(0).unwrap();
        assert_eq!(spec.name(), "app_name");
        // double application changes nothing
        let mut again = arsc.clone();
        publicize(&mut again, &regions).unwrap();
        assert_eq!(again, arsc);
    }
}
