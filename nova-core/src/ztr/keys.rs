//! Control-code dictionaries: byte sequences that decode to `{Tag}` names.

use crate::game::TextGame;
use std::collections::HashMap;
use std::sync::LazyLock;

/// A run of consecutive two-byte codes `[prefix, first + i]` named `{kind names[i]}`.
struct Run {
    prefix: u8,
    first: u8,
    kind: &'static str,
    names: &'static [&'static str],
}

const SINGLE: &[(u8, &str)] = &[
    (0x01, "{Escape}"),
    (0x02, "{Italic}"),
    (0x03, "{StraightLine}"),
    (0x04, "{Article}"),
    (0x05, "{ArticleMany}"),
];

const SPECIAL: &[([u8; 2], &str)] = &[
    ([0x40, 0x70], "{Text NewPage}"),
    ([0x40, 0x72], "{Text NewLine}"),
    ([0x85, 0x60], "{Text Tab}"),
    ([0xF4, 0x40], "{Entity 1}"),
    ([0xF4, 0x41], "{Entity 2}"),
    ([0xF4, 0x42], "{Entity 3}"),
    ([0xF4, 0x43], "{Entity 4}"),
    ([0xF6, 0x40], "{Key Entity}"),
    ([0xF7, 0x40], "{Counter Type 1}"),
    ([0xF7, 0x41], "{Counter Type 2}"),
    ([0xF7, 0x42], "{Counter Type 3}"),
];

/// Latin characters the Japanese build stores as `85 xx`, as `(first trail byte, chars)`.
const LATIN_EXT: &[(u8, &str)] = &[
    (0x40, "€"),
    (0x42, "‚"),
    (0x44, "„…†‡"),
    (0x49, "‰Š‹Œ"),
    (0x4E, "Ž"),
    (0x51, "‘’“”•–—"),
    (0x59, "™š›œ"),
    (0x5E, "žŸ"),
    (0x61, "¡¢£¤¥¦§¨©ª«¬"),
    (0x6E, "®¯°±²³´µ¶·¸¹º»¼½¾¿"),
    (0x81, "ÁÂÃÄÅÆÇÈÉÊËÌÍÎÏÐÑÒÓÔÕÖ"),
    (0x98, "ØÙÚÛÜÝ"),
    (0x9F, "À"),
    (0xB6, "×"),
    (0xBD, "Þßàáâãäåæçèéêëìíîïðñòóôõö÷øùúûüýþÿ"),
];

const BUTTONS: &[&str] = &[
    "A", "B", "X", "Y", "Start", "Back", "LB", "RB", "LT", "RT", "DPadLeft", "DPadDown",
    "DPadRight", "DPadUp", "LSLeft", "LSDown", "LSRight", "LSUp", "LSLeftRight", "LSUpDown",
    "LSPress", "RSPress", "RSLeft", "RSDown", "RSRight", "RSUp", "RSLeftRight", "RSUpDown",
    "LStick", "RStick", "DPadUpDown", "DPadLeftRight", "DPad",
];

const BUTTONS_LR: &[&str] = &[
    "A", "B", "X", "Y", "Start", "Back", "LB", "RB", "LT", "RT", "DPadLeft", "DPadDown",
    "DPadRight", "DPadUp", "LSLeft", "LSDown", "LSRight", "LSUp", "LSLeftRight", "LSUpDown",
    "L3Press", "R3Press", "RSLeft", "RSDown", "RSRight", "RSUp", "RSLeftRight", "RSUpDown",
    "LStick", "RStick", "DPadLeftRight", "DPadUpDown", "DPad", "B_2", "A_2",
];

const COLORS_BASE: &[&str] = &[
    "White", "IceBlue", "Gold", "LightRed", "Yellow", "Green", "Gray", "LightGold", "Rose",
    "Purple", "DarkYellow", "Gray2", "Violet", "LightGreen",
];

const COLORS_LATER: &[&str] = &[
    "White", "IceBlue", "Gold", "LightRed", "Yellow", "Green", "Gray", "LightGold", "Rose",
    "Purple", "DarkYellow", "Gray2", "Violet", "LightGreen", "Sapphire", "Violet2",
    "OliveGreen", "DarkCyan", "Lavender", "Brown", "Gold2", "Gold3", "DarkGray", "DarkRed",
    "Jade", "SmokeGray", "DarkGold", "Magenta", "PureWhite", "Orange", "NavyBlue",
];

const COLORS_EX_LOW: &[&str] = &[
    "Ex00", "Ex01", "Ex02", "Ex03", "Ex04", "Ex05", "Ex06", "Ex07", "Ex08", "Ex09", "Ex10",
    "Ex11", "Ex12", "Ex13",
];

const COLORS_EX_HIGH: &[&str] = &[
    "Ex14", "Ex15", "Ex16", "Ex17", "Ex18", "Ex19", "Ex20", "Ex21", "Ex22", "Ex23", "Ex24",
    "Ex25", "Ex26",
];

const ICONS_F0_FF131: &[&str] = &[
    "Clock", "Warning", "Notification", "Gil", "Arrow_Right", "Arrow_Left", "Mission_Note",
    "Check_Mark", "Ability_Synthesized",
];

const ICONS_F0_FF132: &[&str] = &[
    "Clock", "Warning", "Notification", "Gil", "Arrow_Right", "Arrow_Left", "Mission_Note",
    "Check_Mark", "Bonus_Ability", "Foot_Print", "Tamed_Crystal", "Monster_Cross", "Monster",
    "Casino_Coins", "Lock_Type1", "Lock_Type2", "Paradigm_Cross", "Paradigm_Wide",
    "Paradigm_Normal", "Chocobo_Strat", "Terrible_Condition", "Subpar_Condition",
    "Normal_Condition", "Good_Condition", "Top_Condition", "Nine", "Tiny_Bomb", "Tiny_Chocobo",
    "Tiny_Mog", "Cactuar", "Tiny_Chu", "Heart", "Plus", "Objective",
];

const ICONS_F0_FF133: &[&str] = &[
    "Chat", "Warning", "Notification", "Outerworld_Thoughts", "Arrow_Right", "Arrow_Left",
    "Mission_Note", "Thumbs_Up", "Bonus_Ability", "Defense_Up", "Canvas_Quest_Done", "Schema3",
    "Schema2", "Schema1", "Hourglass", "Lock", "Object0_Big", "Object1_Big", "Object2_Big",
    "Object_Star_Big", "Hammer", "Cube", "Hourglass_Half", "Megaphone", "Gift", "Object1_Small",
    "Object2_Small", "Object_Star_Small", "Wizard_Hat", "ATB_Speed", "Staggering",
    "Stagger_Preserve", "Small_Star", "Objective",
];

const ICONS_F2_EARLY: &[&str] = &[
    "Gunblade", "Pistol", "Emblem", "Boomerang", "Staff", "Spear", "Knife", "Water_Drop",
    "Datalog", "Eidolith_Crystal", "Omni_Kit", "Shop_Pass", "Synthetic_Component",
    "Organic_Component", "Catalyst_Component", "Accessory_Type1", "Accessory_Type2",
    "Accessory_Type3", "Accessory_Type4", "Potion", "Container_Type1", "Container_Type2",
    "Phoenix_Down", "Shroud", "Sack", "Ability_Passive", "Ability_Physical", "Ability_Magic",
    "Ability_Defense", "Ability_Heal", "Ability_Debuff", "Status_Ailment", "Ability_Buff",
    "Alert", "Sword", "Shield", "Magic_Staff", "Unknown1", "Unknown2", "Unknown3",
    "Ability_Eidolon", "Ability_Technique", "Ribbon", "Amulet", "Necklace",
];

const ICONS_F2_FF133: &[&str] = &[
    "Sword", "Greatsword", "Rapier", "Dual_Blades", "Staff", "Spear", "Knife", "Water_Drop",
    "Datalog", "Eidolith_Crystal", "Wrench", "Mechanical_Material", "Synthetic_Component",
    "Organic_Component", "Catalyst_Component", "Arm_Accessory", "Ring", "Brooch",
    "Head_Accessory", "Container_Type1", "Container_Type2", "Container_Type3", "Phoenix_Down",
    "Clock", "Sack", "Auto_Ability", "Ability_Physical", "Ability_Magic", "Shield",
    "Heart_Plus", "Ability_Debuff", "Status_Ailment", "Ability_Buff", "Heart", "Greatsword2",
    "Unknown1", "Check_Mark", "Cross_Mark", "Unknown2", "Unknown3", "Ability_Eidolon", "EP",
    "Ribbon", "Amulet", "Necklace", "Plant_Component", "Fluid_Component", "Malistone", "Bow",
    "Dual_Blades2", "Question_Mark", "Gil", "Leveling_Allowed", "Map", "Garb", "Item_Capacity",
];

const fn run(prefix: u8, first: u8, kind: &'static str, names: &'static [&'static str]) -> Run {
    Run {
        prefix,
        first,
        kind,
        names,
    }
}

fn runs_for(game: TextGame) -> Vec<Run> {
    match game {
        TextGame::Ff131 => vec![
            run(0xF9, 0x32, "Color", COLORS_EX_LOW),
            run(0xF9, 0x40, "Color", COLORS_BASE),
            run(0xF9, 0x4F, "Color", COLORS_EX_HIGH),
            run(0xF9, 0x5E, "Color", &["Ex27", "Ex28"]),
            run(0xF0, 0x40, "Icon", ICONS_F0_FF131),
            run(0xF2, 0x40, "Icon", ICONS_F2_EARLY),
            run(0xF1, 0x40, "Btn", BUTTONS),
        ],
        TextGame::Ff132 => vec![
            run(0xF9, 0x40, "Color", COLORS_LATER),
            run(0xF0, 0x40, "Icon", ICONS_F0_FF132),
            run(0xF2, 0x40, "Icon", ICONS_F2_EARLY),
            run(0xF1, 0x40, "Btn", BUTTONS),
        ],
        TextGame::Ff133 => vec![
            run(0xF9, 0x40, "Color", COLORS_LATER),
            run(0xF0, 0x40, "Icon", ICONS_F0_FF133),
            run(0xF2, 0x40, "Icon", ICONS_F2_FF133),
            run(0xF1, 0x40, "Btn", BUTTONS_LR),
        ],
    }
}

/// Bidirectional tag tables for one game.
#[derive(Debug, Default)]
pub struct KeySet {
    single: HashMap<u8, &'static str>,
    pair: HashMap<[u8; 2], String>,
    by_tag: HashMap<String, Vec<u8>>,
    latin: HashMap<u8, char>,
    latin_rev: HashMap<char, u8>,
}

impl KeySet {
    fn build(game: TextGame) -> Self {
        let mut keys = KeySet::default();
        for &(b, tag) in SINGLE {
            keys.single.insert(b, tag);
            keys.by_tag.insert(tag.to_string(), vec![b]);
        }
        let mut add_pair = |code: [u8; 2], tag: String| {
            keys.by_tag.entry(tag.clone()).or_insert_with(|| code.to_vec());
            keys.pair.insert(code, tag);
        };
        for &(code, tag) in SPECIAL {
            add_pair(code, tag.to_string());
        }
        for r in runs_for(game) {
            for (i, name) in r.names.iter().enumerate() {
                add_pair([r.prefix, r.first + i as u8], format!("{{{} {name}}}", r.kind));
            }
        }
        for &(first, chars) in LATIN_EXT {
            for (i, c) in chars.chars().enumerate() {
                let trail = first + i as u8;
                keys.latin.insert(trail, c);
                keys.latin_rev.insert(c, trail);
            }
        }
        keys
    }

    pub fn for_game(game: TextGame) -> &'static KeySet {
        static SETS: LazyLock<[KeySet; 3]> = LazyLock::new(|| {
            [
                KeySet::build(TextGame::Ff131),
                KeySet::build(TextGame::Ff132),
                KeySet::build(TextGame::Ff133),
            ]
        });
        &SETS[game as usize]
    }

    pub fn single(&self, b: u8) -> Option<&'static str> {
        self.single.get(&b).copied()
    }

    pub fn pair(&self, a: u8, b: u8) -> Option<&str> {
        self.pair.get(&[a, b]).map(String::as_str)
    }

    pub fn bytes_for(&self, tag: &str) -> Option<&[u8]> {
        self.by_tag.get(tag).map(Vec::as_slice)
    }

    /// `85 xx` Latin character, if `trail` names one.
    pub fn latin(&self, trail: u8) -> Option<char> {
        self.latin.get(&trail).copied()
    }

    pub fn latin_trail(&self, c: char) -> Option<u8> {
        self.latin_rev.get(&c).copied()
    }

    pub fn tag_count(&self) -> usize {
        self.by_tag.len()
    }
}

pub const LATIN_LEAD: u8 = 0x85;
