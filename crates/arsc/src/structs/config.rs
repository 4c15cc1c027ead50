use std::fmt;
use std::fmt::Write;
use std::str::FromStr;

use log::warn;
use winnow::binary::{le_u16, le_u32, u8};
use winnow::prelude::*;
use winnow::token::take;

// Sub-field masks inside the packed screen_layout / input_flags /
// screen_layout2 / color_mode bytes.
const MASK_SCREENSIZE: u8 = 0x0f;
const MASK_SCREENLONG: u8 = 0x30;
const MASK_LAYOUTDIR: u8 = 0xc0;
const MASK_KEYSHIDDEN: u8 = 0x03;
const MASK_NAVHIDDEN: u8 = 0x0c;
const MASK_SCREENROUND: u8 = 0x03;
const MASK_WIDE_COLOR_GAMUT: u8 = 0x03;
const MASK_HDR: u8 = 0x0c;
const MASK_UI_MODE_TYPE: u8 = 0x0f;
const MASK_UI_MODE_NIGHT: u8 = 0x30;

const DENSITY_ANY: u16 = 0xfffe;
const DENSITY_NONE: u16 = 0xffff;

/// A resource qualifier tuple, one per `values-<qualifier>` variant.
///
/// Fields are stored unpacked; equality and hashing are field-wise and
/// include the preserved `unknown` tail, so two configs compare equal
/// exactly when their canonical byte forms would.
///
/// Layout reference:
/// <https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=967>
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResConfig {
    pub mcc: u16,
    pub mnc: u16,

    /// Two ASCII bytes, or a packed 3-letter ISO-639-2 code (big-endian,
    /// high bit set). `[0, 0]` means "any".
    pub language: [u8; 2],
    /// Two ASCII bytes or a packed UN M.49 region, same packing rules.
    pub country: [u8; 2],

    pub orientation: u8,
    pub touchscreen: u8,
    pub density: u16,

    pub keyboard: u8,
    pub navigation: u8,
    pub input_flags: u8,
    pub grammatical_inflection: u8,

    pub screen_width: u16,
    pub screen_height: u16,

    pub sdk_version: u16,
    pub minor_version: u16,

    /// Packed size / long / direction bits, see the `MASK_*` constants.
    pub screen_layout: u8,
    pub ui_mode: u8,
    pub smallest_screen_width_dp: u16,

    pub screen_width_dp: u16,
    pub screen_height_dp: u16,

    /// ISO-15924 script (`Latn`, `Hant`, …), zero filled.
    pub locale_script: [u8; 4],
    /// BCP-47 variant subtag, zero filled.
    pub locale_variant: [u8; 8],

    /// Round/notround qualifier bits.
    pub screen_layout2: u8,
    /// Wide gamut and HDR bits.
    pub color_mode: u8,

    pub locale_numbering_system: [u8; 8],

    /// Bytes past the last field this decoder knows, preserved so equality
    /// and re-encoding stay faithful on inputs from newer toolchains.
    pub unknown: Vec<u8>,
}

impl ResConfig {
    /// Decode one size-prefixed config block, consuming exactly the declared
    /// number of bytes. Fields are read only when the size prefix reaches
    /// them; anything past the known layout lands in `unknown`.
    pub fn parse(input: &mut &[u8]) -> ModalResult<ResConfig> {
        let start = input.len();
        let size = le_u32.parse_next(input)?;

        let mut config = ResConfig::default();

        (le_u16, le_u16).map(|(mcc, mnc)| {
            config.mcc = mcc;
            config.mnc = mnc;
        })
        .parse_next(input)?;

        (take(2usize), take(2usize))
            .map(|(language, country): (&[u8], &[u8])| {
                config.language.copy_from_slice(language);
                config.country.copy_from_slice(country);
            })
            .parse_next(input)?;

        (u8, u8, le_u16)
            .map(|(orientation, touchscreen, density)| {
                config.orientation = orientation;
                config.touchscreen = touchscreen;
                config.density = density;
            })
            .parse_next(input)?;

        if size >= 20 {
            (u8, u8, u8, u8)
                .map(|(keyboard, navigation, input_flags, inflection)| {
                    config.keyboard = keyboard;
                    config.navigation = navigation;
                    config.input_flags = input_flags;
                    config.grammatical_inflection = inflection;
                })
                .parse_next(input)?;
        }
        if size >= 24 {
            (le_u16, le_u16)
                .map(|(w, h)| {
                    config.screen_width = w;
                    config.screen_height = h;
                })
                .parse_next(input)?;
        }
        if size >= 28 {
            (le_u16, le_u16)
                .map(|(sdk, minor)| {
                    config.sdk_version = sdk;
                    config.minor_version = minor;
                })
                .parse_next(input)?;
        }
        if size >= 32 {
            (u8, u8, le_u16)
                .map(|(layout, ui_mode, sw_dp)| {
                    config.screen_layout = layout;
                    config.ui_mode = ui_mode;
                    config.smallest_screen_width_dp = sw_dp;
                })
                .parse_next(input)?;
        }
        if size >= 36 {
            (le_u16, le_u16)
                .map(|(w, h)| {
                    config.screen_width_dp = w;
                    config.screen_height_dp = h;
                })
                .parse_next(input)?;
        }
        if size >= 40 {
            config.locale_script = read_array(input)?;
        }
        if size >= 48 {
            config.locale_variant = read_array(input)?;
        }
        if size >= 52 {
            (u8, u8, le_u16)
                .map(|(layout2, color_mode, _pad)| {
                    config.screen_layout2 = layout2;
                    config.color_mode = color_mode;
                })
                .parse_next(input)?;
        }
        if size >= 53 {
            // locale_script_was_computed, only meaningful at runtime
            let _ = u8.parse_next(input)?;
        }
        if size >= 61 {
            config.locale_numbering_system = read_array(input)?;
        }
        if size > 64 {
            warn!("config block of {} bytes, newer than this decoder", size);
        }

        // preserve whatever the declared size still covers
        let consumed = (start - input.len()) as u32;
        let tail = take(size.saturating_sub(consumed) as usize).parse_next(input)?;
        // explicit end padding carries no information
        if tail.iter().any(|&b| b != 0) {
            config.unknown = tail.to_vec();
        }

        Ok(config)
    }

    /// The unqualified (default) configuration.
    pub fn is_default(&self) -> bool {
        *self == ResConfig::default()
    }

    /// Canonical qualifier string, empty for the default config.
    ///
    /// Matches the `values-<qualifier>` directory naming, so
    /// `"fr-rFR-xhdpi-v21"` style output. Unknown field values render as
    /// `name=value` diagnostics, which [`ResConfig::from_str`] also accepts.
    pub fn qualifiers(&self) -> String {
        let mut out = String::new();

        if self.mcc != 0 {
            push(&mut out, format_args!("mcc{}", self.mcc));
        }
        if self.mnc != 0 {
            push(&mut out, format_args!("mnc{}", self.mnc));
        }

        self.append_locale(&mut out);

        match self.grammatical_inflection & 0x03 {
            0 => {}
            1 => push(&mut out, "neuter"),
            2 => push(&mut out, "feminine"),
            _ => push(&mut out, "masculine"),
        }

        match self.screen_layout & MASK_LAYOUTDIR {
            0 => {}
            0x40 => push(&mut out, "ldltr"),
            0x80 => push(&mut out, "ldrtl"),
            v => push(&mut out, format_args!("layoutDir={}", v)),
        }

        if self.smallest_screen_width_dp != 0 {
            push(&mut out, format_args!("sw{}dp", self.smallest_screen_width_dp));
        }
        if self.screen_width_dp != 0 {
            push(&mut out, format_args!("w{}dp", self.screen_width_dp));
        }
        if self.screen_height_dp != 0 {
            push(&mut out, format_args!("h{}dp", self.screen_height_dp));
        }

        match self.screen_layout & MASK_SCREENSIZE {
            0 => {}
            1 => push(&mut out, "small"),
            2 => push(&mut out, "normal"),
            3 => push(&mut out, "large"),
            4 => push(&mut out, "xlarge"),
            v => push(&mut out, format_args!("screenLayoutSize={}", v)),
        }
        match self.screen_layout & MASK_SCREENLONG {
            0 => {}
            0x10 => push(&mut out, "notlong"),
            0x20 => push(&mut out, "long"),
            v => push(&mut out, format_args!("screenLayoutLong={}", v)),
        }

        match self.screen_layout2 & MASK_SCREENROUND {
            0 => {}
            1 => push(&mut out, "notround"),
            2 => push(&mut out, "round"),
            v => push(&mut out, format_args!("screenRound={}", v)),
        }
        match self.color_mode & MASK_WIDE_COLOR_GAMUT {
            0 => {}
            1 => push(&mut out, "nowidecg"),
            2 => push(&mut out, "widecg"),
            v => push(&mut out, format_args!("wideColorGamut={}", v)),
        }
        match self.color_mode & MASK_HDR {
            0 => {}
            0x04 => push(&mut out, "lowdr"),
            0x08 => push(&mut out, "highdr"),
            v => push(&mut out, format_args!("hdr={}", v)),
        }

        match self.orientation {
            0 => {}
            1 => push(&mut out, "port"),
            2 => push(&mut out, "land"),
            3 => push(&mut out, "square"),
            v => push(&mut out, format_args!("orientation={}", v)),
        }

        match self.ui_mode & MASK_UI_MODE_TYPE {
            0 | 1 => {}
            2 => push(&mut out, "desk"),
            3 => push(&mut out, "car"),
            4 => push(&mut out, "television"),
            5 => push(&mut out, "appliance"),
            6 => push(&mut out, "watch"),
            7 => push(&mut out, "vrheadset"),
            v => push(&mut out, format_args!("uiModeType={}", v)),
        }
        match self.ui_mode & MASK_UI_MODE_NIGHT {
            0 => {}
            0x10 => push(&mut out, "notnight"),
            0x20 => push(&mut out, "night"),
            v => push(&mut out, format_args!("uiModeNight={}", v)),
        }

        match self.density {
            0 => {}
            120 => push(&mut out, "ldpi"),
            160 => push(&mut out, "mdpi"),
            213 => push(&mut out, "tvdpi"),
            240 => push(&mut out, "hdpi"),
            320 => push(&mut out, "xhdpi"),
            480 => push(&mut out, "xxhdpi"),
            640 => push(&mut out, "xxxhdpi"),
            DENSITY_ANY => push(&mut out, "anydpi"),
            DENSITY_NONE => push(&mut out, "nodpi"),
            v => push(&mut out, format_args!("{}dpi", v)),
        }

        match self.touchscreen {
            0 => {}
            1 => push(&mut out, "notouch"),
            2 => push(&mut out, "stylus"),
            3 => push(&mut out, "finger"),
            v => push(&mut out, format_args!("touchscreen={}", v)),
        }

        match self.input_flags & MASK_KEYSHIDDEN {
            0 => {}
            1 => push(&mut out, "keysexposed"),
            2 => push(&mut out, "keyshidden"),
            _ => push(&mut out, "keyssoft"),
        }
        match self.keyboard {
            0 => {}
            1 => push(&mut out, "nokeys"),
            2 => push(&mut out, "qwerty"),
            3 => push(&mut out, "12key"),
            v => push(&mut out, format_args!("keyboard={}", v)),
        }
        match self.input_flags & MASK_NAVHIDDEN {
            0 => {}
            0x04 => push(&mut out, "navexposed"),
            0x08 => push(&mut out, "navhidden"),
            v => push(&mut out, format_args!("navHidden={}", v)),
        }
        match self.navigation {
            0 => {}
            1 => push(&mut out, "nonav"),
            2 => push(&mut out, "dpad"),
            3 => push(&mut out, "trackball"),
            4 => push(&mut out, "wheel"),
            v => push(&mut out, format_args!("navigation={}", v)),
        }

        if self.screen_width != 0 || self.screen_height != 0 {
            push(
                &mut out,
                format_args!("{}x{}", self.screen_width, self.screen_height),
            );
        }

        if self.sdk_version != 0 {
            push(&mut out, format_args!("v{}", self.sdk_version));
            if self.minor_version != 0 {
                let _ = write!(out, ".{}", self.minor_version);
            }
        }

        out
    }

    /// `values` directory name for this configuration.
    pub fn directory_name(&self) -> String {
        let qualifiers = self.qualifiers();
        if qualifiers.is_empty() {
            "values".to_owned()
        } else {
            format!("values-{}", qualifiers)
        }
    }

    fn append_locale(&self, out: &mut String) {
        if self.language == [0, 0] && self.country == [0, 0] {
            return;
        }

        let script_set = self.locale_script != [0u8; 4];
        let variant_set = self.locale_variant != [0u8; 8];

        if script_set || variant_set {
            // modified BCP-47 form, as aapt emits for script/variant locales
            let mut tag = String::from("b+");
            tag.push_str(&unpack_lang(self.language));
            if script_set {
                tag.push('+');
                tag.push_str(zero_terminated(&self.locale_script));
            }
            if self.country != [0, 0] {
                tag.push('+');
                tag.push_str(&unpack_lang(self.country).to_ascii_uppercase());
            }
            if variant_set {
                tag.push('+');
                tag.push_str(zero_terminated(&self.locale_variant));
            }
            push(out, tag);
            return;
        }

        if self.language != [0, 0] {
            push(out, unpack_lang(self.language));
        }
        if self.country != [0, 0] {
            push(
                out,
                format_args!("r{}", unpack_lang(self.country).to_ascii_uppercase()),
            );
        }
    }
}

impl fmt::Display for ResConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let qualifiers = self.qualifiers();
        if qualifiers.is_empty() {
            f.write_str("default")
        } else {
            f.write_str(&qualifiers)
        }
    }
}

fn push(out: &mut String, part: impl fmt::Display) {
    if !out.is_empty() {
        out.push('-');
    }
    let _ = write!(out, "{}", part);
}

fn read_array<const N: usize>(input: &mut &[u8]) -> ModalResult<[u8; N]> {
    let mut out = [0u8; N];
    let slice = take(N).parse_next(input)?;
    out.copy_from_slice(slice);
    Ok(out)
}

fn zero_terminated(bytes: &[u8]) -> &str {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end]).unwrap_or("")
}

/// Decode a two-byte language/region field: ASCII pair, or the packed
/// three-letter form with bit 15 set (big-endian layout).
fn unpack_lang(raw: [u8; 2]) -> String {
    let value = u16::from_be_bytes(raw);
    if value & 0x8000 == 0 {
        return String::from_utf8_lossy(&raw).into_owned();
    }

    let first = (value & 0x1f) as u8 + b'a';
    let second = ((value >> 5) & 0x1f) as u8 + b'a';
    let third = ((value >> 10) & 0x1f) as u8 + b'a';
    String::from_utf8_lossy(&[first, second, third]).into_owned()
}

/// Inverse of [`unpack_lang`]: two ASCII letters stay raw, three letters use
/// the packed form.
fn pack_lang(code: &str) -> [u8; 2] {
    let bytes = code.as_bytes();
    match bytes.len() {
        2 => [bytes[0], bytes[1]],
        3 => {
            let f = (bytes[0].to_ascii_lowercase() - b'a') as u16;
            let s = (bytes[1].to_ascii_lowercase() - b'a') as u16;
            let t = (bytes[2].to_ascii_lowercase() - b'a') as u16;
            (0x8000 | f | (s << 5) | (t << 10)).to_be_bytes()
        }
        _ => [0, 0],
    }
}

fn copy_padded<const N: usize>(value: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let bytes = value.as_bytes();
    let n = bytes.len().min(N);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Parse a canonical qualifier string back into a config.
///
/// Inverse of [`ResConfig::qualifiers`] for every config the decoder
/// produces without an `unknown` tail.
impl FromStr for ResConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<ResConfig, String> {
        let mut config = ResConfig::default();
        if s.is_empty() {
            return Ok(config);
        }

        for token in s.split('-') {
            if !apply_token(&mut config, token) {
                return Err(format!("unrecognized qualifier '{}'", token));
            }
        }

        Ok(config)
    }
}

fn apply_token(c: &mut ResConfig, token: &str) -> bool {
    // fixed keywords first, they shadow the pattern forms below
    match token {
        "neuter" => return set(&mut c.grammatical_inflection, 1),
        "feminine" => return set(&mut c.grammatical_inflection, 2),
        "masculine" => return set(&mut c.grammatical_inflection, 3),
        "ldltr" => return or(&mut c.screen_layout, 0x40),
        "ldrtl" => return or(&mut c.screen_layout, 0x80),
        "small" => return or(&mut c.screen_layout, 1),
        "normal" => return or(&mut c.screen_layout, 2),
        "large" => return or(&mut c.screen_layout, 3),
        "xlarge" => return or(&mut c.screen_layout, 4),
        "notlong" => return or(&mut c.screen_layout, 0x10),
        "long" => return or(&mut c.screen_layout, 0x20),
        "notround" => return or(&mut c.screen_layout2, 1),
        "round" => return or(&mut c.screen_layout2, 2),
        "nowidecg" => return or(&mut c.color_mode, 1),
        "widecg" => return or(&mut c.color_mode, 2),
        "lowdr" => return or(&mut c.color_mode, 0x04),
        "highdr" => return or(&mut c.color_mode, 0x08),
        "port" => return set(&mut c.orientation, 1),
        "land" => return set(&mut c.orientation, 2),
        "square" => return set(&mut c.orientation, 3),
        "desk" => return or(&mut c.ui_mode, 2),
        "car" => return or(&mut c.ui_mode, 3),
        "television" => return or(&mut c.ui_mode, 4),
        "appliance" => return or(&mut c.ui_mode, 5),
        "watch" => return or(&mut c.ui_mode, 6),
        "vrheadset" => return or(&mut c.ui_mode, 7),
        "notnight" => return or(&mut c.ui_mode, 0x10),
        "night" => return or(&mut c.ui_mode, 0x20),
        "ldpi" => return set16(&mut c.density, 120),
        "mdpi" => return set16(&mut c.density, 160),
        "tvdpi" => return set16(&mut c.density, 213),
        "hdpi" => return set16(&mut c.density, 240),
        "xhdpi" => return set16(&mut c.density, 320),
        "xxhdpi" => return set16(&mut c.density, 480),
        "xxxhdpi" => return set16(&mut c.density, 640),
        "anydpi" => return set16(&mut c.density, DENSITY_ANY),
        "nodpi" => return set16(&mut c.density, DENSITY_NONE),
        "notouch" => return set(&mut c.touchscreen, 1),
        "stylus" => return set(&mut c.touchscreen, 2),
        "finger" => return set(&mut c.touchscreen, 3),
        "keysexposed" => return or(&mut c.input_flags, 1),
        "keyshidden" => return or(&mut c.input_flags, 2),
        "keyssoft" => return or(&mut c.input_flags, 3),
        "nokeys" => return set(&mut c.keyboard, 1),
        "qwerty" => return set(&mut c.keyboard, 2),
        "12key" => return set(&mut c.keyboard, 3),
        "navexposed" => return or(&mut c.input_flags, 0x04),
        "navhidden" => return or(&mut c.input_flags, 0x08),
        "nonav" => return set(&mut c.navigation, 1),
        "dpad" => return set(&mut c.navigation, 2),
        "trackball" => return set(&mut c.navigation, 3),
        "wheel" => return set(&mut c.navigation, 4),
        _ => {}
    }

    // name=value diagnostic forms for field values outside the known sets
    if let Some((name, value)) = token.split_once('=') {
        let Ok(v) = value.parse::<u16>() else {
            return false;
        };
        return match name {
            "layoutDir" | "screenLayoutSize" | "screenLayoutLong" => or(&mut c.screen_layout, v as u8),
            "screenRound" => or(&mut c.screen_layout2, v as u8),
            "wideColorGamut" | "hdr" => or(&mut c.color_mode, v as u8),
            "orientation" => set(&mut c.orientation, v as u8),
            "uiModeType" | "uiModeNight" => or(&mut c.ui_mode, v as u8),
            "touchscreen" => set(&mut c.touchscreen, v as u8),
            "keyboard" => set(&mut c.keyboard, v as u8),
            "navHidden" => or(&mut c.input_flags, v as u8),
            "navigation" => set(&mut c.navigation, v as u8),
            _ => false,
        };
    }

    if let Some(rest) = token.strip_prefix("mcc") {
        return parse_num(rest, &mut c.mcc);
    }
    if let Some(rest) = token.strip_prefix("mnc") {
        return parse_num(rest, &mut c.mnc);
    }

    if let Some(rest) = token.strip_prefix("b+") {
        return apply_bcp47(c, rest);
    }

    if let Some(rest) = token.strip_prefix("sw").and_then(|r| r.strip_suffix("dp")) {
        return parse_num(rest, &mut c.smallest_screen_width_dp);
    }
    if let Some(rest) = token.strip_prefix('w').and_then(|r| r.strip_suffix("dp")) {
        return parse_num(rest, &mut c.screen_width_dp);
    }
    if let Some(rest) = token.strip_prefix('h').and_then(|r| r.strip_suffix("dp")) {
        return parse_num(rest, &mut c.screen_height_dp);
    }

    if let Some(rest) = token.strip_suffix("dpi") {
        return parse_num(rest, &mut c.density);
    }

    if let Some(rest) = token.strip_prefix('v')
        && rest.chars().next().is_some_and(|ch| ch.is_ascii_digit())
    {
        return match rest.split_once('.') {
            Some((sdk, minor)) => {
                parse_num(sdk, &mut c.sdk_version) && parse_num(minor, &mut c.minor_version)
            }
            None => parse_num(rest, &mut c.sdk_version),
        };
    }

    if let Some((w, h)) = token.split_once('x')
        && !w.is_empty()
        && w.chars().all(|ch| ch.is_ascii_digit())
        && !h.is_empty()
        && h.chars().all(|ch| ch.is_ascii_digit())
    {
        return parse_num(w, &mut c.screen_width) && parse_num(h, &mut c.screen_height);
    }

    // region: r + uppercase code
    if let Some(rest) = token.strip_prefix('r')
        && (2..=3).contains(&rest.len())
        && rest.chars().all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
    {
        c.country = pack_lang(rest);
        return true;
    }

    // plain language code
    if (2..=3).contains(&token.len()) && token.chars().all(|ch| ch.is_ascii_lowercase()) {
        c.language = pack_lang(token);
        return true;
    }

    false
}

fn apply_bcp47(c: &mut ResConfig, tag: &str) -> bool {
    for (i, part) in tag.split('+').enumerate() {
        if i == 0 {
            c.language = pack_lang(part);
        } else if part.len() == 4 && part.chars().next().is_some_and(|ch| ch.is_ascii_uppercase()) {
            c.locale_script = copy_padded(part);
        } else if (2..=3).contains(&part.len())
            && part.chars().all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
        {
            c.country = pack_lang(part);
        } else {
            c.locale_variant = copy_padded(part);
        }
    }
    !tag.is_empty()
}

fn set(field: &mut u8, value: u8) -> bool {
    *field = value;
    true
}

fn set16(field: &mut u16, value: u16) -> bool {
    *field = value;
    true
}

fn or(field: &mut u8, value: u8) -> bool {
    *field |= value;
    true
}

fn parse_num<T: FromStr>(text: &str, out: &mut T) -> bool {
    match text.parse() {
        Ok(v) => {
            *out = v;
            true
        }
        Err(_) => false,
    }
}
