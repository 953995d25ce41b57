//! # Gazetteer Padrão e Textos de Demonstração
//!
//! Listas curtas de entidades que as regras de sufixo não capturam (nomes
//! próprios sem sufixo característico), mais alguns manuscritos de exemplo
//! para a interface web.

use crate::tagger::EntityCategory;

/// Entradas embutidas no reconhecedor padrão.
pub fn default_gazetteer() -> Vec<(EntityCategory, &'static str)> {
    use EntityCategory::*;
    vec![
        // ===== PESSOAS =====
        (Per, "岸田文雄"),
        (Per, "石破茂"),
        (Per, "大谷翔平"),
        (Per, "村上春樹"),
        (Per, "宮崎駿"),
        // ===== ORGANIZAÇÕES =====
        (Org, "トヨタ自動車"),
        (Org, "ソニー"),
        (Org, "任天堂"),
        (Org, "日本銀行"),
        (Org, "NHK"),
        (Org, "国連"),
        (Org, "自民党"),
        // ===== LOCAIS =====
        (Loc, "日本"),
        (Loc, "東京"),
        (Loc, "大阪"),
        (Loc, "京都"),
        (Loc, "北海道"),
        (Loc, "沖縄"),
        (Loc, "アメリカ"),
        (Loc, "中国"),
        (Loc, "富士山"),
        // ===== EVENTOS =====
        (Event, "東京五輪"),
        (Event, "大阪万博"),
        (Event, "ワールドカップ"),
        // ===== MISC =====
        (Misc, "新型コロナウイルス"),
    ]
}

/// Textos de demonstração para a interface web.
pub fn demo_texts() -> Vec<(&'static str, &'static str)> {
    vec![
        ("会議", "東京都で会議が開かれた。"),
        (
            "政治",
            "岸田文雄首相は官邸でバイデン大統領と電話会談し、来年の主要国首脳会議について協議した。会談には外務省の担当者も同席した。",
        ),
        (
            "経済",
            "トヨタ自動車は名古屋市で記者会見を開き、株式会社メルカリとの提携を発表した。日本銀行の金融政策決定会合を前に、市場の関心が高まっている。",
        ),
        (
            "スポーツ",
            "大谷翔平選手はロサンゼルスでの試合に出場し、ワールドシリーズ進出に貢献した。地元の北海道でもパブリックビューイングが行われた。",
        ),
        (
            "要確認",
            "架空の港町である白波町の観光協会は、幻の名産品「霧灯り饅頭」の復刻を目指す白波灯籠祭を企画している。",
        ),
    ]
}
