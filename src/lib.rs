//! zpilot - 编辑器 AI 插件运行时
//!
//! 模块结构：
//! - kernel::plugins: 事件总线、插件上下文、注册表、生命周期运行时
//! - kernel::stream: 流式帧解析
//! - kernel::completion: 行内补全引擎（防抖、取消、缓存）
//! - kernel::chat: 多轮对话引擎
//! - kernel::services: 端口（ports）与适配器（adapters）

pub mod kernel;
