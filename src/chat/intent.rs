//! Three-tier routing of incoming chat messages.
//!
//! 1. Greetings and test pings get a canned reply without touching the LLM.
//! 2. Messages about returns go through retrieval over the policy documents.
//! 3. Everything else is answered by the LLM directly.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Simple,
    ReturnRelated,
    General,
}

const SIMPLE_INPUTS: &[&str] = &[
    "測試", "test", "嗨", "hi", "hello", "你好", "哈囉", "halo", "在嗎", "在不在", "有人嗎",
    "可以聊天嗎", "可以說話嗎", "!", "？", "?", "嘿", "hey", "yo", "哇", "wow",
];

const RETURN_KEYWORDS: &[&str] = &[
    "退貨", "退款", "退回", "換貨", "退換", "不滿意", "有問題", "壞了", "破損", "瑕疵", "不合適",
    "尺寸不對", "顏色不對", "收到錯誤", "想退", "申請退", "辦理退", "如何退", "退貨流程",
    "退貨期限", "退貨條件", "退貨政策", "退貨規定", "可以退嗎", "能退嗎", "退貨費用",
];

fn normalize(message: &str) -> String {
    message.trim().to_lowercase()
}

/// Fixed greeting/test inputs, or anything of three characters or fewer.
pub fn is_simple_greeting_or_test(message: &str) -> bool {
    let m = normalize(message);
    SIMPLE_INPUTS.contains(&m.as_str()) || m.chars().count() <= 3
}

pub fn is_return_related(message: &str) -> bool {
    let m = normalize(message);
    RETURN_KEYWORDS.iter().any(|k| m.contains(k))
}

pub fn classify(message: &str) -> Intent {
    if is_simple_greeting_or_test(message) {
        Intent::Simple
    } else if is_return_related(message) {
        Intent::ReturnRelated
    } else {
        Intent::General
    }
}

/// Canned reply for simple inputs.
pub fn simple_response(message: &str) -> &'static str {
    match normalize(message).as_str() {
        "測試" | "test" => "系統運行正常！有什麼關於退貨政策的問題我可以幫您解答嗎？",
        "嗨" | "hi" | "hello" | "你好" | "哈囉" | "halo" => {
            "您好！我是客服助理，專門協助處理退貨相關問題。請問有什麼需要幫助的嗎？"
        }
        "在嗎" | "在不在" | "有人嗎" => "是的，我在線上！有什麼退貨問題需要協助嗎？",
        _ => "您好！我是智能客服助理，專門回答退貨政策相關問題。請具體描述您的問題，我會盡力為您解答。",
    }
}
