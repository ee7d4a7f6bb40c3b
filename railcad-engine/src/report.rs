//! 批处理结果：逐条失败不致中断整批，但每次运行都必须能回答
//! 处理了多少、成功多少、跳过了哪些以及原因。

/// 一次批量操作的汇总。`records` 为成功产出，`skipped` 为
/// 被跳过的输入及原因，`processed` 为输入总数。
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub records: Vec<T>,
    pub processed: usize,
    pub skipped: Vec<Skipped>,
}

/// 单条被跳过的输入：标识 + 原因，供运行结束时逐条汇报。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub item: String,
    pub reason: String,
}

impl<T> BatchOutcome<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            processed: 0,
            skipped: Vec::new(),
        }
    }

    #[inline]
    pub fn succeeded(&self) -> usize {
        self.records.len()
    }

    pub fn skip(&mut self, item: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(Skipped {
            item: item.into(),
            reason: reason.into(),
        });
    }
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self::new()
    }
}
