// Sample corpus and marked-up documents with known citation outputs
// WHY: integration tests need deterministic inputs whose resolved references are known

/// Small corpus in the `book -> chapter -> verse -> text` shape, with one metadata entry
pub const SAMPLE_CORPUS_JSON: &str = r#"{
  "_source": "sample of the Authorized Version",
  "Genesis": {
    "1": {
      "1": "In the beginning God created the heaven and the earth.",
      "2": "And the earth was without form, and void; and darkness was upon the face of the deep.",
      "3": "And God said, Let there be light: and there was light.",
      "4": "And God saw the light, that it was good: and God divided the light from the darkness.",
      "5": "And God called the light Day, and the darkness he called Night. And the evening and the morning were the first day."
    }
  },
  "Exodus": {
    "20": {
      "1": "And God spake all these words, saying,",
      "2": "I am the LORD thy God, which have brought thee out of the land of Egypt, out of the house of bondage.",
      "3": "Thou shalt have no other gods before me.",
      "18": "And all the people saw the thunderings, and the lightnings, and the noise of the trumpet, and the mountain smoking.",
      "19": "And they said unto Moses, Speak thou with us, and we will hear: but let not God speak with us, lest we die."
    }
  },
  "Haggai": {
    "1": {
      "1": "In the second year of Darius the king, in the sixth month, in the first day of the month, came the word of the LORD by Haggai the prophet unto Zerubbabel, saying,",
      "2": "Thus speaketh the LORD of hosts, saying, This people say, The time is not come, the time that the LORD'S house should be built.",
      "3": "Then came the word of the LORD by Haggai the prophet, saying,",
      "4": "Is it time for you, O ye, to dwell in your cieled houses, and this house lie waste?"
    }
  },
  "Matthew": {
    "5": {
      "1": "And seeing the multitudes, he went up into a mountain: and when he was set, his disciples came unto him:",
      "2": "And he opened his mouth, and taught them, saying,",
      "3": "Blessed are the poor in spirit: for theirs is the kingdom of heaven.",
      "4": "Blessed are they that mourn: for they shall be comforted.",
      "5": "Blessed are the meek: for they shall inherit the earth."
    }
  },
  "John": {
    "14": {
      "26": "But the Comforter, which is the Holy Ghost, whom the Father will send in my name, he shall teach you all things.",
      "27": "Peace I leave with you, my peace I give unto you: not as the world giveth, give I unto you. Let not your heart be troubled, neither let it be afraid."
    }
  }
}"#;

/// Marked-up document: a two-verse beatitude, an exact verse, and an unresolvable quote
pub fn sample_tagged_document() -> String {
    let filler = " And the multitude wondered at these sayings.".repeat(4);
    format!(
        "And he opened his mouth, and taught them, saying, \
         <FR>Blessed are the poor in spirit: for theirs is the kingdom of heaven.<Fr> \
         <FR>Blessed are they that mourn: for they shall be comforted.<Fr>\
         {filler}\n\
         Jesus answered and said unto them, <FR>Peace I leave with you, my peace I give unto you: \
         not as the world giveth, give I unto you. Let not your heart be troubled, neither let it be afraid.<Fr>\
         {filler}\n\
         <FR>xyzxyz<Fr>\n"
    )
}

/// Expected `reference` strings for [`sample_tagged_document`], in order
pub const SAMPLE_TAGGED_REFERENCES: &[&str] = &["Matthew 5:3-4", "John 14:27", "Reference not found"];

/// Expected cue blocks for [`SAMPLE_CORPUS_JSON`] over the Old Testament books
pub const SAMPLE_CUE_REFERENCES: &[&str] = &["Genesis 1:3-5", "Exodus 20:1-3", "Haggai 1:2-4"];
