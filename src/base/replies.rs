//! Canned reply texts.

/// Reply to a greeting in `smart` mode.
pub const GREETING_REPLY: &str = "您好！我是飞书机器人，很高兴为您服务！";

/// Reply to a help request in `smart` mode.
pub const HELP_REPLY: &str = "我可以帮您处理以下内容：\n1. 回答常见问题\n2. 创建服务台工单\n3. 查询工单状态";

/// Greetings recognized in `smart` mode.
pub const GREETING_KEYWORDS: &[&str] = &["你好", "您好", "hi", "hello"];

/// Help keywords recognized in `smart` mode.
pub const HELP_KEYWORDS: &[&str] = &["帮助", "help"];

/// Echo reply in `echo` mode.
pub fn echo_reply(bot_name: &str, text: &str) -> String {
    format!("【{bot_name}】收到你的消息：{text}")
}

/// Fallback reply in `smart` mode.
pub fn acknowledge_reply(text: &str) -> String {
    format!("收到您的消息：{text}\n我会尽快处理！")
}
