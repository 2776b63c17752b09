use crate::game::DbGame;

pub const MAGIC: &[u8; 4] = b"WPD\0";
pub const FILE_HEADER_LEN: usize = 16;
pub const SECTION_HEADER_LEN: usize = 32;
pub const SECTION_NAME_LEN: usize = 16;
pub const SECTION_ALIGN: u64 = 4;

pub const SHEET_NAME_SECTION: &str = "!!sheetname";
pub const STRING_SECTION: &str = "!!string";
pub const WORD_TYPES_SECTION: &str = "!!strtypelist";
pub const WORD_TYPES_COMPACT_SECTION: &str = "!!strtypelistb";
pub const TYPE_LIST_SECTION: &str = "!!typelist";
pub const VERSION_SECTION: &str = "!!version";
pub const FIELD_NAMES_SECTION: &str = "!structitem";
pub const FIELD_COUNT_SECTION: &str = "!structitemnum";
pub const STRING_ARRAY_SECTION: &str = "!!strArray";
pub const STRING_ARRAY_INFO_SECTION: &str = "!!strArrayInfo";
pub const STRING_ARRAY_LIST_SECTION: &str = "!!strArrayList";

pub const DEFAULT_OFFSETS_PER_VALUE: u32 = 2;
pub const DEFAULT_BITS_PER_OFFSET: u32 = 16;

/// Header keys a parsed file reports; anything else is rejected on write.
pub const KEY_SHEET_NAME: &str = "sheetName";
pub const KEY_VERSION: &str = "version";
pub const KEY_TYPE_LIST: &str = "typelist";
pub const KEY_COMPACT_WORD_TYPES: &str = "compactTypeList";
pub const KEY_WORD_TYPES: &str = "strtypelist";
pub const KEY_OFFSETS_PER_VALUE: &str = "offsetsPerValue";
pub const KEY_BITS_PER_OFFSET: &str = "bitsPerOffset";
pub const KEY_FIELD_NAMES: &str = "structitem";

/// Leading record entry carrying the record's section name.
pub const RECORD_KEY: &str = "record";

/// Per-game database layout, chosen once per parse or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub game: DbGame,
    /// Word types stored one byte each (`!!strtypelistb`) rather than as u32.
    pub compact_word_types: bool,
    /// `!structitem` holds string-pool offsets instead of inline names.
    pub pooled_field_names: bool,
    /// Bit-packed string fields indexing `!!strArray` are allowed.
    pub string_arrays: bool,
    /// `!!string` and `!!typelist` are written even when empty.
    pub always_pool_and_type_list: bool,
}

impl Layout {
    pub fn for_game(game: DbGame) -> Self {
        match game {
            DbGame::Ff13 => Layout {
                game,
                compact_word_types: false,
                pooled_field_names: true,
                string_arrays: false,
                always_pool_and_type_list: true,
            },
            DbGame::Ff132 => Layout {
                game,
                compact_word_types: true,
                pooled_field_names: false,
                string_arrays: true,
                always_pool_and_type_list: false,
            },
        }
    }
}

pub fn is_reserved(section_name: &str) -> bool {
    section_name.starts_with('!')
}
