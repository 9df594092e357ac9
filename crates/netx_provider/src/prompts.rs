pub(crate) const MAX_SUBQUESTIONS: usize = 3;

pub(crate) fn decompose_system() -> String {
    format!(
        "You are an expert network analyst. Break the user's question about a packet capture \
         into at most {MAX_SUBQUESTIONS} simple sub-questions that, answered in order, lead to the \
         answer. Write one sub-question per line with no numbering, no introduction and no extra \
         text."
    )
}

pub(crate) fn answer_system(trace: &str, tools: bool) -> String {
    let hint = if tools {
        " Use the calculator tool for every arithmetic operation instead of computing by hand."
    } else {
        ""
    };
    format!(
        "You are an expert network analyst. Answer the question using only the packet capture \
         below. Each line is one packet with the columns No., Time, Source, Destination, \
         Protocol, Length and Info separated by ' | '. Be concise and give the exact value when \
         the question asks for one.{hint}\n\nCapture:\n{trace}"
    )
}

pub(crate) fn synthesize_system() -> String {
    "You are an expert network analyst. Using the sub-questions and their answers, write one \
     short final answer to the original question. State the final value clearly."
        .to_string()
}

pub(crate) fn synthesize_user(question: &str, pairs: &str) -> String {
    format!("Original question: {question}\n\n{pairs}")
}
