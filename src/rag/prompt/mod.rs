
use super::intent::{Intent, PromptTemplate};
use crate::config::PromptConfig;
use crate::embeddings::Chunk;

/// Answer returned without calling the model when retrieval found nothing.
pub const NO_CONTEXT_ANSWER: &str = "<p>Tôi xin lỗi, tôi không tìm thấy bất kỳ thông tin liên quan nào trong cơ sở dữ liệu của Nhà trường. Vui lòng thử câu hỏi khác.</p>";

const HTML_INSTRUCTION: &str = "QUAN TRỌNG: Câu trả lời phải được định dạng bằng **HTML hợp lệ** (sử dụng các thẻ <h3>, <table>, <b>, <br>, <p>) để hiển thị chuyên nghiệp trên giao diện web. \
Sử dụng thẻ <table> cho dữ liệu có cấu trúc (như danh sách, bảng). Tuyệt đối không sử dụng định dạng Markdown (như ##, *, -). \
Hãy **TỔNG HỢP** thông tin từ tất cả các đoạn trích liên quan để đưa ra câu trả lời đầy đủ nhất.";

/// What to do with a question once its context is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPlan {
    /// Nothing to ground an answer on; reply with this text directly.
    Fallback(String),
    Prompt {
        template: PromptTemplate,
        text: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    #[inline]
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Pick a template for `intent` and fill in the context and question.
    #[inline]
    pub fn build(&self, question: &str, context: &[Chunk], intent: Intent) -> PromptPlan {
        let context_text = join_context(context);
        if context_text.trim().is_empty() {
            return PromptPlan::Fallback(NO_CONTEXT_ANSWER.to_string());
        }

        let template = intent.template();
        let text = match template {
            PromptTemplate::Student => self.student_prompt(&context_text, question),
            PromptTemplate::Admission => self.admission_prompt(&context_text, question),
            PromptTemplate::General => self.general_prompt(&context_text, question),
        };

        PromptPlan::Prompt { template, text }
    }

    fn student_prompt(&self, context: &str, question: &str) -> String {
        format!(
            "Bạn là trợ lý thông tin sinh viên của {institution}. {HTML_INSTRUCTION}\
Ưu tiên trả lời câu hỏi dựa trên các thông tin từ bảng nếu có. Dựa trên các thông tin sau, hãy trả lời câu hỏi của người dùng một cách chính xác và ngắn gọn. Nếu thông tin không liên quan hoặc không đủ để trả lời, hãy trả lời bằng một thẻ <p> rằng 'Tôi không tìm thấy thông tin phù hợp về sinh viên này'.\
\nNội dung được cung cấp:\n{context}\nCâu hỏi của sinh viên: {question}",
            institution = self.config.institution,
        )
    }

    fn admission_prompt(&self, context: &str, question: &str) -> String {
        format!(
            "Bạn là trợ lý tư vấn tuyển sinh của {institution}. {HTML_INSTRUCTION}\
Dựa trên nội dung sau, hãy trả lời câu hỏi của người dùng một cách đầy đủ và chính xác. Nếu không có thông tin phù hợp, hãy trả lời bằng một thẻ <p> rằng 'Tôi không tìm thấy thông tin phù hợp về tuyển sinh'.\
Sử dụng thẻ <table> cho thông tin học phí, điểm chuẩn hoặc các danh sách liên quan. \
\nNội dung được cung cấp:\n{context}\nCâu hỏi về tuyển sinh: {question}",
            institution = self.config.institution,
        )
    }

    fn general_prompt(&self, context: &str, question: &str) -> String {
        format!(
            "Bạn là Trợ lý Thông tin chính thức của {institution} ({short_name}). {HTML_INSTRUCTION}\
Dựa vào **DUY NHẤT** các thông tin được cung cấp dưới đây, hãy trả lời câu hỏi của người dùng. \
Sử dụng các tiêu đề <h3> và thẻ <table> cho dữ liệu cấu trúc phức tạp. \
\n\n--- BẮT ĐẦU NỘI DUNG CUNG CẤP ---\n{context}\n--- KẾT THÚC NỘI DUNG CUNG CẤP ---\n\n\
Câu hỏi của người dùng: {question}\n\n\
QUY TẮC PHẢN HỒI:\n1. **Chỉ sử dụng** thông tin trong phần 'Nội dung được cung cấp' để trả lời.\n\
2. Nếu thông tin được cung cấp **không đủ** hoặc **không liên quan** để trả lời câu hỏi, hãy trả lời bằng một thẻ <p> rằng: 'Tôi xin lỗi, tôi không tìm thấy thông tin chính thức phù hợp trong cơ sở dữ liệu của Nhà trường để trả lời câu hỏi này.' Tuyệt đối **không được tự ý bịa đặt hoặc suy đoán**.",
            institution = self.config.institution,
            short_name = self.config.institution_short_name,
        )
    }
}

/// Chunk texts in retrieval order, one per line.
#[inline]
pub fn join_context(context: &[Chunk]) -> String {
    context
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
