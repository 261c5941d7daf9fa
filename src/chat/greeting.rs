use rand::seq::IndexedRandom;

pub const GREETINGS: [&str; 5] = [
    "您好！我是您的專屬客服助理，很高興為您服務！請問有什麼可以幫助您的呢？",
    "歡迎來到 Foodie！我是客服助理，隨時準備協助您處理各種問題。有什麼需要幫忙的嗎？",
    "您好！歡迎使用我們的服務！我可以幫您處理退貨、換貨或任何產品相關的問題。請告訴我您的需求！",
    "嗨！很開心見到您！我是您的貼心客服，專門協助處理訂單和產品問題。請問今天可以為您做什麼呢？",
    "您好！感謝您選擇 Foodie！我是客服助理，專業處理退貨、換貨等服務。有任何問題都可以問我哦！",
];

/// Message sent through the retrieval pipeline to produce a tailored greeting.
pub const GREETING_PROMPT: &str =
    "你好，我剛進入聊天室，請給我一個專業且友善的問候，並簡單說明你能幫助我什麼。";

pub fn random_greeting() -> &'static str {
    GREETINGS.choose(&mut rand::rng()).copied().unwrap_or(GREETINGS[0])
}
