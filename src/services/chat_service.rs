use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::chat_dto::{ChatContext, ChatMessageRequest, ChatResponse, HistoryRole, Rating, Resource};
use crate::error::Result;
use crate::services::ai_service::{GeminiClient, TextModel};

const CHAT_MAX_OUTPUT_TOKENS: u32 = 500;
const HISTORY_WINDOW: usize = 3;

const SYSTEM_PROMPT: &str = "You are an AI learning assistant for Quizzify, an educational platform. Your role is to:

1. Help students understand concepts and solve problems
2. Provide clear, educational explanations
3. Give hints without directly providing answers
4. Encourage learning and critical thinking
5. Adapt your explanations to the student's level

Guidelines:
- Be encouraging and supportive
- Break down complex concepts into simple steps
- Use examples and analogies when helpful
- Ask follow-up questions to ensure understanding
- Provide study tips and learning strategies
- Keep responses concise but comprehensive

If the user is working on a specific topic or question, use that context to provide more relevant help.";

const MATH_WORDS: &[&str] = &["math", "calculate", "equation", "algebra", "geometry"];
const SCIENCE_WORDS: &[&str] = &["science", "physics", "chemistry", "biology"];
const STUDY_WORDS: &[&str] = &["study", "learn", "tips", "help"];

const MATH_REPLY: &str = "I'd be happy to help with math! Here are some general tips:

1. **Break down the problem**: Identify what you know and what you need to find
2. **Choose the right method**: Think about which mathematical concepts apply
3. **Work step by step**: Don't try to solve everything at once
4. **Check your answer**: Does it make sense in the context?

Could you share the specific math problem you're working on? I can provide more targeted guidance.";

const SCIENCE_REPLY: &str = "Science concepts can be tricky, but I'm here to help! Here's my approach:

1. **Understand the fundamentals**: Make sure you grasp the basic principles
2. **Use real-world examples**: Connect concepts to things you see daily
3. **Practice with problems**: Apply the theory to solve actual questions
4. **Draw diagrams**: Visual representations often make concepts clearer

What specific science topic are you studying? I can provide more focused assistance.";

const STUDY_REPLY: &str = "Here are some effective learning strategies:

📚 **Active Learning**:
- Summarize concepts in your own words
- Teach the material to someone else
- Create mind maps or diagrams

⏰ **Time Management**:
- Use the Pomodoro Technique (25-min focused sessions)
- Take regular breaks to maintain concentration
- Review material regularly, not just before tests

🎯 **Practice**:
- Work through practice problems
- Take quizzes to test your understanding
- Focus on areas where you struggle most

What subject are you studying? I can give more specific advice!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Math,
    Science,
    Other,
}

impl Subject {
    fn of_topic(context: Option<&ChatContext>) -> Self {
        let Some(topic) = context.and_then(|c| c.topic.as_deref()) else {
            return Subject::Other;
        };
        let topic = topic.to_lowercase();
        if topic.contains("math") {
            Subject::Math
        } else if topic.contains("science") {
            Subject::Science
        } else {
            Subject::Other
        }
    }
}

pub fn build_prompt(message: &str, context: Option<&ChatContext>) -> String {
    let mut prompt = format!("{}\n\n", SYSTEM_PROMPT);

    if let Some(ctx) = context {
        if !ctx.conversation_history.is_empty() {
            prompt.push_str("Previous conversation:\n");
            let start = ctx.conversation_history.len().saturating_sub(HISTORY_WINDOW);
            for msg in &ctx.conversation_history[start..] {
                let speaker = match msg.role {
                    HistoryRole::User => "User",
                    HistoryRole::Bot => "Assistant",
                };
                prompt.push_str(&format!("{}: {}\n", speaker, msg.content));
            }
            prompt.push('\n');
        }
        if let Some(topic) = ctx.topic.as_deref().filter(|t| !t.is_empty()) {
            prompt.push_str(&format!("Current topic: {}\n", topic));
        }
        if let Some(question) = ctx.question.as_deref().filter(|q| !q.is_empty()) {
            prompt.push_str(&format!("Current question context: {}\n", question));
        }
    }

    prompt.push_str(&format!("\nUser: {}\nAssistant:", message));
    prompt
}

pub fn fallback_reply(message: &str, context: Option<&ChatContext>) -> String {
    let lower = message.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if mentions(MATH_WORDS) {
        MATH_REPLY.to_string()
    } else if mentions(SCIENCE_WORDS) {
        SCIENCE_REPLY.to_string()
    } else if mentions(STUDY_WORDS) {
        STUDY_REPLY.to_string()
    } else {
        let topic_note = context
            .and_then(|c| c.topic.as_deref())
            .filter(|t| !t.is_empty())
            .map(|t| format!(" I see you're working on {} - that's a great subject to master!", t))
            .unwrap_or_default();
        format!(
            "I'm here to help you learn and understand concepts better!{}

I can assist you with:
• 📖 Explaining difficult concepts in simple terms
• 💡 Providing hints and guidance for problems
• 📝 Sharing study strategies and tips
• 🎯 Breaking down complex topics into manageable parts

Feel free to ask me specific questions about what you're studying, or let me know if you'd like help with a particular problem. The more details you provide, the better I can assist you!

What would you like to explore today?",
            topic_note
        )
    }
}

pub fn suggestions(context: Option<&ChatContext>) -> Vec<String> {
    let items: &[&str] = match Subject::of_topic(context) {
        Subject::Math => &[
            "Help me solve this math problem",
            "Explain the formula I should use",
            "Show me the step-by-step solution",
            "What's a good way to check my answer?",
        ],
        Subject::Science => &[
            "Explain the scientific concept",
            "Give me a real-world example",
            "What's the underlying principle?",
            "How does this connect to other topics?",
        ],
        Subject::Other => &[
            "Explain this concept step by step",
            "Give me a hint for this problem",
            "Show me similar examples",
            "What are the key points to remember?",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}

pub fn resources(context: Option<&ChatContext>) -> Vec<Resource> {
    let items: &[(&str, &str)] = match Subject::of_topic(context) {
        Subject::Math => &[
            ("Khan Academy Math", "https://www.khanacademy.org/math"),
            ("Wolfram Alpha - Math Solver", "https://www.wolframalpha.com"),
            ("PatrickJMT - Math Videos", "https://patrickjmt.com"),
        ],
        Subject::Science => &[
            ("Khan Academy Science", "https://www.khanacademy.org/science"),
            ("Crash Course Science", "https://www.youtube.com/user/crashcourse"),
        ],
        Subject::Other => &[
            ("Khan Academy - Free Online Learning", "https://www.khanacademy.org"),
            ("Coursera - Online Courses", "https://www.coursera.org"),
        ],
    };
    items
        .iter()
        .map(|(title, url)| Resource {
            title: title.to_string(),
            url: url.to_string(),
        })
        .collect()
}

pub struct ChatService<M: TextModel = GeminiClient> {
    pool: PgPool,
    model: M,
}

impl<M: TextModel + Clone> Clone for ChatService<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            model: self.model.clone(),
        }
    }
}

impl<M: TextModel> ChatService<M> {
    pub fn new(pool: PgPool, model: M) -> Self {
        Self { pool, model }
    }

    pub async fn reply(&self, req: &ChatMessageRequest) -> ChatResponse {
        let context = req.context.as_ref();
        let response = if self.model.is_configured() {
            let prompt = build_prompt(&req.message, context);
            match self.model.generate(&prompt, CHAT_MAX_OUTPUT_TOKENS).await {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => {
                    tracing::warn!("model returned an empty chat reply");
                    fallback_reply(&req.message, context)
                }
                Err(e) => {
                    tracing::error!(error = ?e, "chat model call failed");
                    fallback_reply(&req.message, context)
                }
            }
        } else {
            fallback_reply(&req.message, context)
        };

        ChatResponse {
            response,
            suggestions: suggestions(context),
            resources: resources(context),
        }
    }

    pub async fn rate(&self, user_id: Uuid, message_id: i64, rating: Rating) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO chat_ratings (user_id, message_id, rating) VALUES ($1, $2, $3)"#,
        )
        .bind(user_id)
        .bind(message_id)
        .bind(rating.as_str())
        .execute(&self.pool)
        .await?;
        tracing::info!(%user_id, message_id, rating = rating.as_str(), "chat reply rated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::chat_dto::HistoryMessage;
    use crate::error::Error;
    use crate::services::ai_service::MockTextModel;

    fn context(topic: &str) -> ChatContext {
        ChatContext {
            topic: Some(topic.to_string()),
            question: None,
            conversation_history: Vec::new(),
        }
    }

    fn lazy_pool() -> PgPool {
        crate::database::pool::create_lazy_pool("postgres://localhost/unused").unwrap()
    }

    #[test]
    fn fallback_picks_subject_by_keyword() {
        assert!(fallback_reply("How do I solve this equation?", None).contains("help with math"));
        assert!(fallback_reply("chemistry is hard", None).contains("Science concepts"));
        assert!(fallback_reply("any tips?", None).contains("learning strategies"));
        let general = fallback_reply("hello there", Some(&context("History")));
        assert!(general.contains("working on History"));
    }

    #[test]
    fn topic_specific_suggestions_and_resources() {
        assert_eq!(suggestions(Some(&context("Math 101")))[0], "Help me solve this math problem");
        assert_eq!(resources(Some(&context("Science"))).len(), 2);
        assert_eq!(resources(None)[1].url, "https://www.coursera.org");
    }

    #[test]
    fn prompt_keeps_last_three_history_messages() {
        let mut ctx = context("Biology");
        ctx.question = Some("What is ATP?".into());
        ctx.conversation_history = (0..5)
            .map(|i| HistoryMessage {
                role: if i % 2 == 0 { HistoryRole::User } else { HistoryRole::Bot },
                content: format!("msg{}", i),
            })
            .collect();
        let prompt = build_prompt("Explain it", Some(&ctx));
        assert!(!prompt.contains("msg1"));
        assert!(prompt.contains("User: msg2"));
        assert!(prompt.contains("Assistant: msg3"));
        assert!(prompt.contains("Current topic: Biology"));
        assert!(prompt.contains("Current question context: What is ATP?"));
        assert!(prompt.ends_with("User: Explain it\nAssistant:"));
    }

    #[tokio::test]
    async fn model_reply_is_used_when_available() {
        let mut mock = MockTextModel::new();
        mock.expect_is_configured().return_const(true);
        mock.expect_generate()
            .withf(|_, max| *max == CHAT_MAX_OUTPUT_TOKENS)
            .returning(|_, _| Box::pin(async { Ok("  Mitochondria make ATP.  ".to_string()) }));
        let service = ChatService::new(lazy_pool(), mock);
        let req = ChatMessageRequest {
            message: "What makes ATP?".into(),
            context: None,
        };
        assert_eq!(service.reply(&req).await.response, "Mitochondria make ATP.");
    }

    #[tokio::test]
    async fn model_error_uses_fallback() {
        let mut mock = MockTextModel::new();
        mock.expect_is_configured().return_const(true);
        mock.expect_generate()
            .returning(|_, _| Box::pin(async { Err(Error::Internal("down".into())) }));
        let service = ChatService::new(lazy_pool(), mock);
        let req = ChatMessageRequest {
            message: "algebra question".into(),
            context: None,
        };
        let reply = service.reply(&req).await;
        assert!(reply.response.contains("help with math"));
        assert_eq!(reply.suggestions.len(), 4);
    }
}
