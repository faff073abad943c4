//! Boolean combinations of child iterators.

use crate::match_data::MatchData;

use super::{
    DocId, SearchCursor, SearchIterator, composite_string, init_children, seek_all, seek_any,
};

/// Intersection: a document matches when every child matches it.
pub struct AndSearch {
    cursor: SearchCursor,
    children: Vec<Box<dyn SearchIterator>>,
}

impl AndSearch {
    pub fn new(children: Vec<Box<dyn SearchIterator>>) -> AndSearch {
        AndSearch {
            cursor: SearchCursor::new(),
            children,
        }
    }
}

impl SearchIterator for AndSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        init_children(&mut self.children, begin, end);
    }

    fn do_seek(&mut self, target: DocId) {
        match seek_all(&mut self.children, target, self.cursor.end_id()) {
            Some(doc_id) => self.cursor.set_doc_id(doc_id),
            None => self.cursor.set_at_end(),
        }
    }

    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData) {
        for child in self.children.iter_mut() {
            child.unpack(doc_id, md);
        }
    }

    fn as_string(&self) -> String {
        composite_string("AndSearch", "", &self.children)
    }
}

/// Union: a document matches when any child matches it. Only the children
/// positioned on the document are unpacked.
pub struct OrSearch {
    cursor: SearchCursor,
    children: Vec<Box<dyn SearchIterator>>,
}

impl OrSearch {
    pub fn new(children: Vec<Box<dyn SearchIterator>>) -> OrSearch {
        OrSearch {
            cursor: SearchCursor::new(),
            children,
        }
    }
}

impl SearchIterator for OrSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        init_children(&mut self.children, begin, end);
    }

    fn do_seek(&mut self, target: DocId) {
        let next = seek_any(&mut self.children, target);
        self.cursor.set_doc_id(next);
    }

    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData) {
        for child in self.children.iter_mut() {
            if child.doc_id() == doc_id {
                child.unpack(doc_id, md);
            }
        }
    }

    fn as_string(&self) -> String {
        composite_string("OrSearch", "", &self.children)
    }
}

/// Difference: documents of the first child that none of the remaining
/// children match.
pub struct AndNotSearch {
    cursor: SearchCursor,
    children: Vec<Box<dyn SearchIterator>>,
}

impl AndNotSearch {
    pub fn new(children: Vec<Box<dyn SearchIterator>>) -> AndNotSearch {
        AndNotSearch {
            cursor: SearchCursor::new(),
            children,
        }
    }

    fn excluded(&mut self, doc_id: DocId) -> bool {
        self.children[1..].iter_mut().any(|neg| neg.seek(doc_id))
    }
}

impl SearchIterator for AndNotSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        init_children(&mut self.children, begin, end);
    }

    fn do_seek(&mut self, mut target: DocId) {
        if self.children.is_empty() {
            self.cursor.set_at_end();
            return;
        }
        loop {
            let positive = &mut self.children[0];
            if !positive.seek(target) {
                if positive.is_at_end() {
                    self.cursor.set_at_end();
                    return;
                }
                target = positive.doc_id();
            }
            if target >= self.cursor.end_id() {
                self.cursor.set_at_end();
                return;
            }
            if !self.excluded(target) {
                self.cursor.set_doc_id(target);
                return;
            }
            target += 1;
        }
    }

    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData) {
        if let Some(positive) = self.children.first_mut() {
            positive.unpack(doc_id, md);
        }
    }

    fn as_string(&self) -> String {
        composite_string("AndNotSearch", "", &self.children)
    }
}

/// The first child decides matching; the remaining children only contribute
/// match data for documents they happen to match as well.
pub struct RankSearch {
    cursor: SearchCursor,
    children: Vec<Box<dyn SearchIterator>>,
}

impl RankSearch {
    pub fn new(children: Vec<Box<dyn SearchIterator>>) -> RankSearch {
        RankSearch {
            cursor: SearchCursor::new(),
            children,
        }
    }
}

impl SearchIterator for RankSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        init_children(&mut self.children, begin, end);
    }

    fn do_seek(&mut self, target: DocId) {
        let Some(first) = self.children.first_mut() else {
            self.cursor.set_at_end();
            return;
        };
        first.seek(target);
        self.cursor.set_doc_id(first.doc_id());
    }

    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData) {
        let mut children = self.children.iter_mut();
        if let Some(first) = children.next() {
            first.unpack(doc_id, md);
        }
        for child in children {
            if child.seek(doc_id) {
                child.unpack(doc_id, md);
            }
        }
    }

    fn as_string(&self) -> String {
        composite_string("RankSearch", "", &self.children)
    }
}
